//! Deterministic finite automaton with guarded edges.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::FormulaError;
use crate::guard::{Guard, VarId};

/// Index of an automaton state.
pub type StateId = usize;

/// Name of the synthetic "episode still running" variable. Always variable 0.
pub const ALIVE: &str = "alive";

/// Variable index of [`ALIVE`].
pub const ALIVE_VAR: VarId = 0;

/// Initial state of every compiled automaton.
pub const INITIAL_STATE: StateId = 0;

/// Accepting sink reached once the episode has ended.
pub const ENDED_STATE: StateId = 1;

/// Coarse classification of the compiled formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaClass {
    /// Syntactically safe: every violation shows up on a finite prefix.
    Safety,
    Other,
}

impl fmt::Display for FormulaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaClass::Safety => write!(f, "safety"),
            FormulaClass::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub src: StateId,
    pub guard: Guard,
    pub dst: StateId,
}

/// Compiled automaton.
///
/// Outgoing edges of a state are kept in insertion order. For any fully
/// assigned set of variables at most one of them is enabled.
#[derive(Debug, Clone)]
pub struct Automaton {
    variables: Vec<String>,
    accepting: Vec<bool>,
    edges: Vec<Vec<Edge>>,
    initial: StateId,
    class: FormulaClass,
}

impl Automaton {
    /// Empty automaton with `num_states` states and no edges.
    pub fn new(
        variables: Vec<String>,
        accepting: Vec<bool>,
        initial: StateId,
        class: FormulaClass,
    ) -> Result<Self, FormulaError> {
        if initial >= accepting.len() {
            return Err(FormulaError::UnknownState(initial));
        }
        let edges = vec![Vec::new(); accepting.len()];
        Ok(Self {
            variables,
            accepting,
            edges,
            initial,
            class,
        })
    }

    pub fn num_states(&self) -> usize {
        self.accepting.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn initial_state(&self) -> StateId {
        self.initial
    }

    /// Unknown states are never accepting.
    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting.get(state).copied().unwrap_or(false)
    }

    /// Lowest-numbered accepting state, if any.
    pub fn first_accepting_state(&self) -> Option<StateId> {
        self.accepting.iter().position(|&a| a)
    }

    pub fn formula_class(&self) -> FormulaClass {
        self.class
    }

    /// Outgoing edges of `state`, in stored order.
    pub fn out(&self, state: StateId) -> &[Edge] {
        self.edges.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Variable names indexed by [`VarId`].
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<VarId> {
        self.variables.iter().position(|v| v == name)
    }

    /// Append an edge after the existing outgoing edges of `src`.
    pub fn add_edge(&mut self, src: StateId, guard: Guard, dst: StateId) -> Result<(), FormulaError> {
        if dst >= self.num_states() {
            return Err(FormulaError::UnknownState(dst));
        }
        let out = self
            .edges
            .get_mut(src)
            .ok_or(FormulaError::UnknownState(src))?;
        out.push(Edge { src, guard, dst });
        Ok(())
    }

    /// Graphviz rendering.
    pub fn to_dot(&self) -> String {
        let mut output = String::from("digraph automaton {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=circle, fontname=\"monospace\"];\n");
        output.push_str("  init [shape=point];\n");

        for state in 0..self.num_states() {
            let shape = if self.is_accepting(state) {
                "doublecircle"
            } else {
                "circle"
            };
            let _ = writeln!(output, "  {state} [shape={shape}];");
        }

        output.push('\n');
        let _ = writeln!(output, "  init -> {};", self.initial);
        for edge in self.edges.iter().flatten() {
            let _ = writeln!(
                output,
                "  {} -> {} [label=\"{}\"];",
                edge.src,
                edge.dst,
                edge.guard.render(&self.variables)
            );
        }

        output.push_str("}\n");
        output
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "automaton: {} states, {} edges, initial {}, {}",
            self.num_states(),
            self.num_edges(),
            self.initial,
            self.class
        )?;
        for edge in self.edges.iter().flatten() {
            writeln!(
                f,
                "  {} -[{}]-> {}",
                edge.src,
                edge.guard.render(&self.variables),
                edge.dst
            )?;
        }
        Ok(())
    }
}
