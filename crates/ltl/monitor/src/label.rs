use std::collections::HashMap;
use std::fmt;

use ltl_automaton::ALIVE;
use serde::{Deserialize, Serialize};

/// Integer identifier of a concrete agent.
pub type AgentId = i32;

/// Named boolean signal, optionally scoped to one agent.
///
/// `Label::new("a")` and `Label::for_agent("a", 3)` are different labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    name: String,
    agent_id: Option<AgentId>,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent_id: None,
        }
    }

    pub fn for_agent(name: impl Into<String>, agent_id: AgentId) -> Self {
        Self {
            name: name.into(),
            agent_id: Some(agent_id),
        }
    }

    /// The synthetic "episode has not ended" signal.
    pub fn alive() -> Self {
        Self::new(ALIVE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        self.agent_id
    }

    pub fn is_agent_specific(&self) -> bool {
        self.agent_id.is_some()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label_str: {} agent_id: ", self.name)?;
        match self.agent_id {
            Some(id) => write!(f, "{id}"),
            None => write!(f, "-"),
        }
    }
}

/// Signal values for one timestep. Need not be exhaustive.
pub type LabelMap = HashMap<Label, bool>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoping_distinguishes_labels() {
        assert_ne!(Label::new("a"), Label::for_agent("a", 0));
        assert_ne!(Label::for_agent("a", 0), Label::for_agent("a", 1));
        assert_eq!(Label::for_agent("a", 2), Label::for_agent("a", 2));
    }

    #[test]
    fn label_map_lookup() {
        let mut labels = LabelMap::new();
        labels.insert(Label::for_agent("close", 7), true);
        assert_eq!(labels.get(&Label::for_agent("close", 7)), Some(&true));
        assert_eq!(labels.get(&Label::new("close")), None);
    }

    #[test]
    fn alive_label() {
        let alive = Label::alive();
        assert_eq!(alive.name(), "alive");
        assert!(!alive.is_agent_specific());
    }

    #[test]
    fn display() {
        assert_eq!(Label::new("a").to_string(), "label_str: a agent_id: -");
        assert_eq!(Label::for_agent("b", 4).to_string(), "label_str: b agent_id: 4");
    }
}
