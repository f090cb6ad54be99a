//! Formula compilation into a deterministic automaton.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::automaton::{Automaton, FormulaClass, StateId, ALIVE, ALIVE_VAR, ENDED_STATE};
use crate::error::FormulaError;
use crate::guard::{Guard, VarId};
use crate::parser::parse;
use crate::progression::{Dnf, Obligation};

/// Turns agent-free formula text into an automaton.
pub trait FormulaCompiler: Send + Sync {
    fn compile(&self, formula: &str) -> Result<Automaton, FormulaError>;
}

/// Size limits enforced during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerLimits {
    pub max_propositions: usize,
    pub max_states: usize,
}

impl Default for CompilerLimits {
    fn default() -> Self {
        Self {
            max_propositions: 12,
            max_states: 4096,
        }
    }
}

/// LTL over finite traces, compiled by progression.
///
/// State 0 is the initial state and state 1 the accepting ended sink. The
/// remaining states are numbered in breadth-first discovery order, so equal
/// formula text always yields the same automaton.
#[derive(Debug, Clone, Default)]
pub struct LtlfCompiler {
    limits: CompilerLimits,
}

impl LtlfCompiler {
    pub fn new(limits: CompilerLimits) -> Self {
        Self { limits }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn limits(&self) -> &CompilerLimits {
        &self.limits
    }
}

enum Node {
    Live(Dnf),
    Ended,
}

impl FormulaCompiler for LtlfCompiler {
    fn compile(&self, formula: &str) -> Result<Automaton, FormulaError> {
        let ltl = parse(formula)?;

        let mut variables = vec![ALIVE.to_string()];
        variables.extend(ltl.atoms().into_iter().filter(|a| a != ALIVE));
        let num_props = variables.len() - 1;
        if num_props > self.limits.max_propositions {
            return Err(FormulaError::TooManyPropositions {
                found: num_props,
                limit: self.limits.max_propositions,
            });
        }

        let nnf = ltl.to_nnf(&|name: &str| variables.iter().position(|v| v == name))?;
        let class = if nnf.is_syntactic_safety() {
            FormulaClass::Safety
        } else {
            FormulaClass::Other
        };

        let init = Dnf::atom(Obligation::Strong(nnf));
        let mut index: BTreeMap<Dnf, StateId> = BTreeMap::new();
        index.insert(init.clone(), 0);
        let mut nodes = vec![Node::Live(init), Node::Ended];

        // (destination, letters) per state, destinations in first-seen order
        let mut transitions: Vec<Vec<(StateId, Vec<u64>)>> = vec![Vec::new(), Vec::new()];
        let mut queue: VecDeque<StateId> = VecDeque::from([0]);
        let letters = 1u64 << num_props;

        while let Some(state) = queue.pop_front() {
            let Node::Live(dnf) = &nodes[state] else {
                continue;
            };
            let dnf = dnf.clone();
            let mut groups: Vec<(StateId, Vec<u64>)> = Vec::new();
            for letter in 0..letters {
                let holds = |var: VarId, positive: bool| {
                    let value = var == ALIVE_VAR || letter >> (var - 1) & 1 == 1;
                    value == positive
                };
                let next = dnf.step(&holds);
                if next.is_bottom() {
                    continue;
                }
                let dst = match index.get(&next) {
                    Some(&id) => id,
                    None => {
                        let id = nodes.len();
                        if id >= self.limits.max_states {
                            return Err(FormulaError::StateLimitExceeded {
                                limit: self.limits.max_states,
                            });
                        }
                        index.insert(next.clone(), id);
                        nodes.push(Node::Live(next));
                        transitions.push(Vec::new());
                        queue.push_back(id);
                        id
                    }
                };
                match groups.iter_mut().find(|(d, _)| *d == dst) {
                    Some((_, set)) => set.push(letter),
                    None => groups.push((dst, vec![letter])),
                }
            }
            transitions[state] = groups;
        }

        let accepting: Vec<bool> = nodes
            .iter()
            .map(|node| match node {
                Node::Live(dnf) => dnf.accepts_empty(),
                Node::Ended => true,
            })
            .collect();

        let mut automaton = Automaton::new(variables, accepting, 0, class)?;
        let vars: Vec<VarId> = (0..=num_props).collect();
        for (state, groups) in transitions.into_iter().enumerate() {
            for (dst, set) in groups {
                let guard = Guard::from_fn(&vars, |row| {
                    row & 1 == 1 && set.binary_search(&(row >> 1)).is_ok()
                });
                automaton.add_edge(state, guard, dst)?;
            }
            if state != ENDED_STATE && automaton.is_accepting(state) {
                automaton.add_edge(state, Guard::literal(ALIVE_VAR, false), ENDED_STATE)?;
            }
        }
        automaton.add_edge(ENDED_STATE, Guard::literal(ALIVE_VAR, false), ENDED_STATE)?;

        debug!(
            formula = %formula,
            states = automaton.num_states(),
            edges = automaton.num_edges(),
            class = %class,
            "compiled formula"
        );
        Ok(automaton)
    }
}

impl<C: FormulaCompiler + ?Sized> FormulaCompiler for Box<C> {
    fn compile(&self, formula: &str) -> Result<Automaton, FormulaError> {
        (**self).compile(formula)
    }
}

impl<C: FormulaCompiler + ?Sized> FormulaCompiler for std::sync::Arc<C> {
    fn compile(&self, formula: &str) -> Result<Automaton, FormulaError> {
        (**self).compile(formula)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::INITIAL_STATE;
    use crate::guard::{Assignment, Tri};

    fn compile(text: &str) -> Automaton {
        LtlfCompiler::with_defaults().compile(text).unwrap()
    }

    fn guards(aut: &Automaton, state: StateId) -> Vec<(String, StateId)> {
        aut.out(state)
            .iter()
            .map(|e| (e.guard.render(aut.variables()), e.dst))
            .collect()
    }

    /// Follow the enabled edge under a full assignment.
    fn run(aut: &Automaton, trace: &[&[(&str, bool)]]) -> Option<StateId> {
        let mut state = aut.initial_state();
        for step in trace {
            let mut a = Assignment::new().with(ALIVE_VAR, true);
            for (name, value) in step.iter() {
                a.set(aut.variable(name)?, *value);
            }
            state = aut
                .out(state)
                .iter()
                .find(|e| e.guard.evaluate(&a) == Tri::True)?
                .dst;
        }
        Some(state)
    }

    #[test]
    fn globally_shape() {
        let aut = compile("G p");
        assert_eq!(aut.num_states(), 3);
        assert_eq!(aut.formula_class(), FormulaClass::Safety);
        assert_eq!(guards(&aut, 0), vec![("alive & p".to_string(), 2)]);
        assert_eq!(
            guards(&aut, 2),
            vec![("alive & p".to_string(), 2), ("!alive".to_string(), 1)]
        );
        assert_eq!(guards(&aut, 1), vec![("!alive".to_string(), 1)]);
        assert!(!aut.is_accepting(INITIAL_STATE));
        assert!(aut.is_accepting(ENDED_STATE));
        assert!(aut.is_accepting(2));
    }

    #[test]
    fn finally_shape() {
        let aut = compile("F p");
        assert_eq!(aut.formula_class(), FormulaClass::Other);
        assert_eq!(
            guards(&aut, 0),
            vec![("alive & !p".to_string(), 0), ("alive & p".to_string(), 2)]
        );
        assert_eq!(
            guards(&aut, 2),
            vec![("alive".to_string(), 2), ("!alive".to_string(), 1)]
        );
    }

    #[test]
    fn variables_start_with_alive() {
        let aut = compile("G (b -> X a)");
        assert_eq!(aut.variables(), &["alive", "b", "a"]);
    }

    #[test]
    fn persistence_accepts_only_suffix_of_a() {
        let aut = compile("F G a");
        let s = run(&aut, &[&[("a", false)]]).unwrap();
        assert!(!aut.is_accepting(s));
        let s = run(&aut, &[&[("a", false)], &[("a", true)]]).unwrap();
        assert!(aut.is_accepting(s));
        let s = run(&aut, &[&[("a", true)], &[("a", false)]]).unwrap();
        assert!(!aut.is_accepting(s));
    }

    #[test]
    fn response_property() {
        let aut = compile("G (req -> F ack)");
        let s = run(&aut, &[&[("req", true), ("ack", false)]]).unwrap();
        assert!(!aut.is_accepting(s));
        let s = run(
            &aut,
            &[&[("req", true), ("ack", false)], &[("req", false), ("ack", true)]],
        )
        .unwrap();
        assert!(aut.is_accepting(s));
    }

    #[test]
    fn strong_next_needs_successor() {
        let aut = compile("X[!] a");
        let s = run(&aut, &[&[("a", false)]]).unwrap();
        assert!(!aut.is_accepting(s));
        let weak = compile("X a");
        let s = run(&weak, &[&[("a", false)]]).unwrap();
        assert!(weak.is_accepting(s));
    }

    #[test]
    fn live_edges_are_exclusive() {
        let aut = compile("(a U b) | G c");
        for state in 0..aut.num_states() {
            for bits in 0..8u64 {
                let mut a = Assignment::new().with(ALIVE_VAR, true);
                for var in 1..=3 {
                    a.set(var, bits >> (var - 1) & 1 == 1);
                }
                let enabled = aut
                    .out(state)
                    .iter()
                    .filter(|e| e.guard.evaluate(&a) == Tri::True)
                    .count();
                assert!(enabled <= 1, "state {state} letter {bits:03b}");
            }
        }
    }

    #[test]
    fn constant_formulas() {
        let t = compile("G true");
        assert_eq!(t.variables(), &["alive"]);
        assert_eq!(run(&t, &[&[], &[]]), Some(2));
        let f = compile("G false");
        assert!(f.out(INITIAL_STATE).is_empty());
    }

    #[test]
    fn same_text_same_automaton() {
        let a = compile("G (a -> (b U c))").to_dot();
        let b = compile("G (a -> (b U c))").to_dot();
        assert_eq!(a, b);
    }

    #[test]
    fn proposition_limit() {
        let text = (0..13).map(|i| format!("p{i}")).collect::<Vec<_>>().join(" & ");
        let err = LtlfCompiler::with_defaults().compile(&text).unwrap_err();
        assert_eq!(
            err,
            FormulaError::TooManyPropositions {
                found: 13,
                limit: 12
            }
        );
    }

    #[test]
    fn state_limit() {
        let compiler = LtlfCompiler::new(CompilerLimits {
            max_propositions: 12,
            max_states: 2,
        });
        assert_eq!(
            compiler.compile("G p").unwrap_err(),
            FormulaError::StateLimitExceeded { limit: 2 }
        );
    }

    #[test]
    fn syntax_errors_propagate() {
        assert!(matches!(
            LtlfCompiler::with_defaults().compile("G (p &"),
            Err(FormulaError::UnexpectedEof)
        ));
    }

    #[test]
    fn boxed_compiler_delegates() {
        let boxed: Box<dyn FormulaCompiler> = Box::new(LtlfCompiler::with_defaults());
        assert_eq!(boxed.compile("F p").unwrap().num_states(), 3);
    }
}
