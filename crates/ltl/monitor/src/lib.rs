//! Runtime monitor for temporal-logic behaviour rules.
//!
//! A rule is an LTL formula over named boolean signals, read over the
//! finite trace of one episode. Propositions may carry a role placeholder
//! (`close#0`), which is bound to a concrete agent when the rule is
//! instantiated. Each timestep the caller supplies a [`LabelMap`] and gets
//! back the penalty for that step; at episode end
//! [`RuleTemplate::final_penalty`] reports whether the trace as a whole was
//! acceptable.
//!
//! ## Components
//!
//! - **Placeholders**: strips `#<n>` role suffixes and collects the alphabet
//! - **RuleTemplate**: one compiled rule, shared by all of its instances
//! - **RuleInstance**: evaluation cursor for one binding of agent roles
//! - **Belief**: Bayesian estimate of whether a rule currently binds
//! - **Config**: serde rule definitions and TOML rule books
//!
//! ```
//! use ltl_monitor::{Label, LabelMap, RulePriority, RuleTemplate};
//!
//! let rule = RuleTemplate::new("G !collision", -1.0, RulePriority(0)).unwrap();
//! let mut instance = rule.instantiate(&[], &[]).remove(0);
//!
//! let mut labels = LabelMap::new();
//! labels.insert(Label::new("collision"), false);
//! assert_eq!(rule.evaluate(&labels, &mut instance), 0.0);
//! ```

#![deny(unsafe_code)]

pub mod belief;
pub mod config;
pub mod error;
pub mod instance;
pub mod label;
pub mod placeholder;
pub mod priority;
pub mod template;

pub use belief::ObservationModel;
pub use config::{RuleBook, RuleConfig, RuleSet};
pub use error::MonitorError;
pub use instance::RuleInstance;
pub use label::{AgentId, Label, LabelMap};
pub use placeholder::{parse_placeholders, ParsedFormula, Proposition};
pub use priority::RulePriority;
pub use template::{RuleTemplate, RuleTemplateBuilder};

pub use ltl_automaton::{Automaton, FormulaClass, FormulaCompiler, FormulaError, LtlfCompiler};
