//! Serializable rule definitions and TOML rule books.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::belief::ObservationModel;
use crate::error::MonitorError;
use crate::instance::RuleInstance;
use crate::label::AgentId;
use crate::priority::RulePriority;
use crate::template::{RuleTemplate, DEFAULT_INITIAL_BELIEF};

/// Definition of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Formula text, placeholders included
    pub formula: String,

    /// Penalty per violating step
    pub weight: f64,

    #[serde(default)]
    pub priority: RulePriority,

    /// Prior probability that the rule binds
    #[serde(default = "default_initial_belief")]
    pub initial_belief: f64,

    /// Penalty for ending in a rejecting state; the weight when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_reward: Option<f64>,

    #[serde(default)]
    pub observation_model: ObservationModel,
}

impl RuleConfig {
    pub fn new(formula: impl Into<String>, weight: f64, priority: RulePriority) -> Self {
        Self {
            formula: formula.into(),
            weight,
            priority,
            initial_belief: default_initial_belief(),
            final_reward: None,
            observation_model: ObservationModel::default(),
        }
    }

    pub fn build(&self) -> Result<Arc<RuleTemplate>, MonitorError> {
        RuleTemplate::from_config(self)
    }
}

fn default_initial_belief() -> f64 {
    DEFAULT_INITIAL_BELIEF
}

/// A list of rules, usually loaded from TOML:
///
/// ```toml
/// [[rules]]
/// formula = "G !collision"
/// weight = -10.0
/// priority = 0
///
/// [[rules]]
/// formula = "G (close#0 -> !overtake#0)"
/// weight = -1.0
/// priority = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBook {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RuleBook {
    pub fn from_toml_str(text: &str) -> Result<Self, MonitorError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, MonitorError> {
        Ok(toml::to_string(self)?)
    }

    /// Compile every rule. Fails on the first rule that does not compile.
    pub fn build(&self) -> Result<RuleSet, MonitorError> {
        let templates = self
            .rules
            .iter()
            .map(RuleTemplate::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        info!(rules = templates.len(), "rule book compiled");
        Ok(RuleSet { templates })
    }
}

/// Compiled rules of a [`RuleBook`], in book order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    templates: Vec<Arc<RuleTemplate>>,
}

impl RuleSet {
    pub fn new(templates: Vec<Arc<RuleTemplate>>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[Arc<RuleTemplate>] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// [`RuleTemplate::instantiate`] over every rule, concatenated in rule
    /// order.
    pub fn instantiate_all(
        &self,
        new_agent_ids: &[AgentId],
        existing_agent_ids: &[AgentId],
    ) -> Vec<RuleInstance> {
        self.templates
            .iter()
            .flat_map(|t| t.instantiate(new_agent_ids, existing_agent_ids))
            .collect()
    }

    pub fn to_book(&self) -> RuleBook {
        RuleBook {
            rules: self.templates.iter().map(|t| t.to_config()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = r#"
[[rules]]
formula = "G !collision"
weight = -10.0

[[rules]]
formula = "G (close#0 -> !overtake#0)"
weight = -1.0
priority = 2
initial_belief = 0.8
final_reward = -5.0
observation_model = [[0.95, 0.5], [0.05, 0.5]]
"#;

    #[test]
    fn parse_book_with_defaults() {
        let book = RuleBook::from_toml_str(BOOK).unwrap();
        assert_eq!(book.rules.len(), 2);

        let first = &book.rules[0];
        assert_eq!(first.priority, RulePriority(0));
        assert_eq!(first.initial_belief, 1.0);
        assert_eq!(first.final_reward, None);
        assert_eq!(first.observation_model, ObservationModel::default());

        let second = &book.rules[1];
        assert_eq!(second.priority, RulePriority(2));
        assert_eq!(second.final_reward, Some(-5.0));
        assert_eq!(second.observation_model.matrix()[1], [0.05, 0.5]);
    }

    #[test]
    fn missing_weight_is_rejected() {
        let err = RuleBook::from_toml_str("[[rules]]\nformula = \"G a\"\n").unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[test]
    fn invalid_observation_model_is_rejected() {
        let text = "[[rules]]\nformula = \"G a\"\nweight = -1.0\nobservation_model = [[1.5, 0.5], [0.1, 0.5]]\n";
        assert!(RuleBook::from_toml_str(text).is_err());
    }

    #[test]
    fn build_and_instantiate_all() {
        let set = RuleBook::from_toml_str(BOOK).unwrap().build().unwrap();
        assert_eq!(set.len(), 2);
        let instances = set.instantiate_all(&[4, 9], &[]);
        // one global instance plus one per agent
        assert_eq!(instances.len(), 3);
        assert!(instances[0].agent_ids().is_empty());
        assert_eq!(instances[1].agent_ids(), &[4]);
        assert_eq!(instances[2].agent_ids(), &[9]);
        assert_eq!(instances[2].belief(), 0.8);
    }

    #[test]
    fn template_round_trips_through_config() {
        let book = RuleBook::from_toml_str(BOOK).unwrap();
        let set = book.build().unwrap();
        assert_eq!(set.to_book(), book);
    }

    #[test]
    fn toml_round_trip() {
        let book = RuleBook::from_toml_str(BOOK).unwrap();
        let text = book.to_toml_string().unwrap();
        assert_eq!(RuleBook::from_toml_str(&text).unwrap(), book);
    }

    #[test]
    fn json_round_trip() {
        let config = RuleConfig::new("F goal", -1.0, RulePriority(1));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("final_reward"));
        let back: RuleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, BOOK).unwrap();
        let book = RuleBook::load(&path).unwrap();
        assert_eq!(book.rules[0].formula, "G !collision");
    }

    #[test]
    fn bad_formula_fails_build() {
        let book = RuleBook {
            rules: vec![RuleConfig::new("G (a", -1.0, RulePriority(0))],
        };
        assert!(matches!(book.build(), Err(MonitorError::Formula(_))));
    }
}
