use thiserror::Error;

/// Errors raised while turning formula text into an automaton.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("syntax error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unexpected end of formula")]
    UnexpectedEof,

    #[error("formula uses {found} propositions, limit is {limit}")]
    TooManyPropositions { found: usize, limit: usize },

    #[error("automaton exceeds {limit} states")]
    StateLimitExceeded { limit: usize },

    #[error("state {0} does not exist")]
    UnknownState(usize),

    #[error("proposition '{0}' has no automaton variable")]
    UnknownProposition(String),
}

impl FormulaError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let e = FormulaError::parse(4, "unexpected token ')'");
        assert_eq!(e.to_string(), "syntax error at offset 4: unexpected token ')'");
    }

    #[test]
    fn limit_error_display() {
        let e = FormulaError::TooManyPropositions {
            found: 14,
            limit: 12,
        };
        let msg = e.to_string();
        assert!(msg.contains("14"));
        assert!(msg.contains("12"));
    }
}
