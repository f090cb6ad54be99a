use std::fmt;
use std::sync::Arc;

use ltl_automaton::StateId;

use crate::label::{AgentId, LabelMap};
use crate::priority::RulePriority;
use crate::template::RuleTemplate;

/// Evaluation cursor of one rule for one binding of agent roles.
///
/// Created by [`RuleTemplate::instantiate`]. `agent_ids[n]` is the agent
/// bound to placeholder slot `n`.
#[derive(Debug, Clone)]
pub struct RuleInstance {
    pub(crate) current_state: StateId,
    pub(crate) violation_count: usize,
    pub(crate) belief: f64,
    pub(crate) agent_ids: Vec<AgentId>,
    template: Arc<RuleTemplate>,
}

impl RuleInstance {
    pub(crate) fn new(template: Arc<RuleTemplate>, agent_ids: Vec<AgentId>) -> Self {
        Self {
            current_state: template.automaton().initial_state(),
            violation_count: 0,
            belief: template.initial_belief(),
            agent_ids,
            template,
        }
    }

    pub fn current_state(&self) -> StateId {
        self.current_state
    }

    pub fn violation_count(&self) -> usize {
        self.violation_count
    }

    pub fn reset_violations(&mut self) {
        self.violation_count = 0;
    }

    /// Current probability that the rule binds.
    pub fn belief(&self) -> f64 {
        self.belief
    }

    pub fn agent_ids(&self) -> &[AgentId] {
        &self.agent_ids
    }

    pub fn is_agent_specific(&self) -> bool {
        !self.agent_ids.is_empty()
    }

    pub fn priority(&self) -> RulePriority {
        self.template.priority()
    }

    pub fn template(&self) -> &Arc<RuleTemplate> {
        &self.template
    }

    /// Shorthand for `self.template().evaluate(labels, self)`.
    pub fn evaluate(&mut self, labels: &LabelMap) -> f64 {
        let template = Arc::clone(&self.template);
        template.evaluate(labels, self)
    }

    pub fn final_penalty(&self) -> f64 {
        self.template.final_penalty(self)
    }

    pub fn update_belief(&mut self) {
        let template = Arc::clone(&self.template);
        template.update_belief(self);
    }
}

impl fmt::Display for RuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.agent_ids.iter().map(ToString::to_string).collect();
        write!(
            f,
            "current_state: {} violations: {} rule: {} agent_ids: [{}]",
            self.current_state,
            self.violation_count,
            self.template.formula(),
            ids.join(", ")
        )
    }
}
