use crate::error::FormulaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Ident(String),
    True,
    False,
    Not,
    And,
    Or,
    Xor,
    Implies,
    Iff,
    Next,
    StrongNext,
    Finally,
    Globally,
    Until,
    WeakUntil,
    Release,
    StrongRelease,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, FormulaError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos] as char;
        let start = pos;

        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if is_ident_char(ch) {
            while pos < bytes.len() && is_ident_char(bytes[pos] as char) {
                pos += 1;
            }
            let word = &input[start..pos];
            let token = match word {
                "true" | "1" => Token::True,
                "false" | "0" => Token::False,
                w if w.bytes().all(|b| b.is_ascii_digit()) => {
                    return Err(FormulaError::parse(
                        start,
                        format!("numeric literal '{w}' is not a proposition"),
                    ));
                }
                w => Token::Ident(w.to_string()),
            };
            tokens.push(Spanned {
                token,
                offset: start,
            });
            continue;
        }

        let rest = &input[pos..];
        let (token, len) = match ch {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '!' | '~' => (Token::Not, 1),
            '^' => (Token::Xor, 1),
            '&' if rest.starts_with("&&") => (Token::And, 2),
            '&' => (Token::And, 1),
            '|' if rest.starts_with("||") => (Token::Or, 2),
            '|' => (Token::Or, 1),
            '/' if rest.starts_with("/\\") => (Token::And, 2),
            '\\' if rest.starts_with("\\/") => (Token::Or, 2),
            '-' if rest.starts_with("->") => (Token::Implies, 2),
            '=' if rest.starts_with("=>") => (Token::Implies, 2),
            '<' if rest.starts_with("<->") => (Token::Iff, 3),
            '<' if rest.starts_with("<=>") => (Token::Iff, 3),
            '<' if rest.starts_with("<>") => (Token::Finally, 2),
            '[' if rest.starts_with("[]") => (Token::Globally, 2),
            'X' if rest.starts_with("X[!]") => (Token::StrongNext, 4),
            'X' => (Token::Next, 1),
            'F' => (Token::Finally, 1),
            'G' => (Token::Globally, 1),
            'U' => (Token::Until, 1),
            'W' => (Token::WeakUntil, 1),
            'R' => (Token::Release, 1),
            'M' => (Token::StrongRelease, 1),
            other => {
                return Err(FormulaError::parse(
                    start,
                    format!("unexpected character '{other}'"),
                ));
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
        pos += len;
    }

    Ok(tokens)
}

/// Characters that may appear in a proposition name.
pub fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_'
}
