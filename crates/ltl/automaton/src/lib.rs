//! LTLf formulas compiled to deterministic automata.
//!
//! Formulas are read in a Spot-compatible syntax and interpreted over
//! finite, non-empty traces. Compilation produces an [`Automaton`] whose
//! edges carry [`Guard`]s over the formula's propositions plus the
//! synthetic `alive` variable that marks the episode as still running.
//!
//! ## Components
//!
//! - **Parser**: tokenizer and precedence-climbing parser for the formula text
//! - **Formula**: syntax tree and negation normal form
//! - **Progression**: one-letter residuals as DNFs of next-step obligations
//! - **Guard**: truth-table guards with three-valued evaluation
//! - **Compiler**: [`FormulaCompiler`] trait and the default [`LtlfCompiler`]

#![deny(unsafe_code)]

pub mod automaton;
pub mod compiler;
pub mod error;
pub mod formula;
pub mod guard;
mod lexer;
pub mod parser;
pub mod progression;

pub use automaton::{
    Automaton, Edge, FormulaClass, StateId, ALIVE, ALIVE_VAR, ENDED_STATE, INITIAL_STATE,
};
pub use compiler::{CompilerLimits, FormulaCompiler, LtlfCompiler};
pub use error::FormulaError;
pub use formula::{Ltl, Nnf};
pub use guard::{Assignment, Guard, Tri, VarId};
pub use lexer::is_ident_char;
pub use parser::parse;
