use ltl_automaton::FormulaError;
use thiserror::Error;

/// Errors raised by rule construction and evaluation.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("formula error: {0}")]
    Formula(#[from] FormulaError),

    #[error("malformed placeholder at offset {offset}: {message}")]
    Placeholder { offset: usize, message: String },

    #[error(
        "proposition '{name}' is used with more than one agent role or scoping; \
         the same proposition over two roles is unsupported"
    )]
    AmbiguousProposition { name: String },

    #[error("initial belief {0} is outside [0, 1]")]
    InvalidBelief(f64),

    #[error("observation model entry {0} is outside [0, 1]")]
    InvalidObservationModel(f64),

    #[error("rule {formula} undefined: missing label \"{label}\"")]
    UndefinedLabel { formula: String, label: String },

    #[error("rule {formula} undefined: no edge decided while alive")]
    Inconsistent { formula: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for MonitorError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MonitorError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}
