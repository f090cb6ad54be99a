use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-assigned rule priority. Ordering follows the wrapped integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RulePriority(pub u32);

impl RulePriority {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for RulePriority {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for RulePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
