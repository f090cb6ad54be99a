//! Bayesian filter over whether a rule currently binds.

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Row index of a "no violation" observation.
pub const NO_VIOLATION: usize = 0;
/// Row index of a "violation" observation.
pub const VIOLATION: usize = 1;
/// Column index of "the rule binds".
pub const BINDS: usize = 0;
/// Column index of "the rule does not bind".
pub const DOES_NOT_BIND: usize = 1;

/// Observation likelihoods `O[observation][true_state]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 2]; 2]", into = "[[f64; 2]; 2]")]
pub struct ObservationModel([[f64; 2]; 2]);

impl ObservationModel {
    pub fn new(matrix: [[f64; 2]; 2]) -> Result<Self, MonitorError> {
        for &p in matrix.iter().flatten() {
            if !(0.0..=1.0).contains(&p) {
                return Err(MonitorError::InvalidObservationModel(p));
            }
        }
        Ok(Self(matrix))
    }

    pub fn matrix(&self) -> &[[f64; 2]; 2] {
        &self.0
    }

    pub fn likelihood(&self, observation: usize, state: usize) -> f64 {
        self.0[observation][state]
    }

    /// One Bayes step on a violation observation.
    ///
    /// Returns the posterior probability that the rule binds, or `None` when
    /// the evidence has zero likelihood under the prior.
    pub fn bayes_update(&self, prior: f64) -> Option<f64> {
        let prior = [prior, 1.0 - prior];
        let row = &self.0[VIOLATION];
        let unnormalized = [row[BINDS] * prior[BINDS], row[DOES_NOT_BIND] * prior[DOES_NOT_BIND]];
        let evidence = unnormalized[BINDS] + unnormalized[DOES_NOT_BIND];
        if evidence <= 0.0 || !evidence.is_finite() {
            return None;
        }
        Some((unnormalized[BINDS] / evidence).clamp(0.0, 1.0))
    }
}

impl Default for ObservationModel {
    fn default() -> Self {
        Self([[0.9, 0.5], [0.1, 0.5]])
    }
}

impl TryFrom<[[f64; 2]; 2]> for ObservationModel {
    type Error = MonitorError;

    fn try_from(matrix: [[f64; 2]; 2]) -> Result<Self, Self::Error> {
        Self::new(matrix)
    }
}

impl From<ObservationModel> for [[f64; 2]; 2] {
    fn from(model: ObservationModel) -> Self {
        model.0
    }
}
