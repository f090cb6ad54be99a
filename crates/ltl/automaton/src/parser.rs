use crate::error::FormulaError;
use crate::formula::Ltl;
use crate::lexer::{tokenize, Spanned, Token};

/// Parse LTLf text into a syntax tree.
///
/// Precedence follows Spot, from loosest to tightest: `->` and `<->` (one
/// level), `|`, `^`, `&`, the binary temporal operators `U W R M`, then the
/// unary operators. `->`, `<->` and the temporal binaries associate to the
/// right.
pub fn parse(input: &str) -> Result<Ltl, FormulaError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens, input.len());
    let formula = parser.parse_implication()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(FormulaError::parse(
            extra.offset,
            format!("unexpected {:?} after formula", extra.token),
        ));
    }
    Ok(formula)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_implication(&mut self) -> Result<Ltl, FormulaError> {
        let lhs = self.parse_or()?;
        let ctor: fn(Box<Ltl>, Box<Ltl>) -> Ltl = match self.peek() {
            Some(Token::Implies) => Ltl::Implies,
            Some(Token::Iff) => Ltl::Iff,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_implication()?;
        Ok(ctor(Box::new(lhs), Box::new(rhs)))
    }

    fn parse_or(&mut self) -> Result<Ltl, FormulaError> {
        let mut lhs = self.parse_xor()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_xor()?;
            lhs = Ltl::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_xor(&mut self) -> Result<Ltl, FormulaError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Xor) {
            let rhs = self.parse_and()?;
            lhs = Ltl::Xor(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Ltl, FormulaError> {
        let mut lhs = self.parse_temporal()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_temporal()?;
            lhs = Ltl::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_temporal(&mut self) -> Result<Ltl, FormulaError> {
        let lhs = self.parse_unary()?;
        let ctor: fn(Box<Ltl>, Box<Ltl>) -> Ltl = match self.peek() {
            Some(Token::Until) => Ltl::Until,
            Some(Token::WeakUntil) => Ltl::WeakUntil,
            Some(Token::Release) => Ltl::Release,
            Some(Token::StrongRelease) => Ltl::StrongRelease,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_temporal()?;
        Ok(ctor(Box::new(lhs), Box::new(rhs)))
    }

    fn parse_unary(&mut self) -> Result<Ltl, FormulaError> {
        let ctor: fn(Box<Ltl>) -> Ltl = match self.peek() {
            Some(Token::Not) => Ltl::Not,
            Some(Token::Next) => Ltl::Next,
            Some(Token::StrongNext) => Ltl::StrongNext,
            Some(Token::Finally) => Ltl::Finally,
            Some(Token::Globally) => Ltl::Globally,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(ctor(Box::new(operand)))
    }

    fn parse_primary(&mut self) -> Result<Ltl, FormulaError> {
        let Some(Spanned { token, offset }) = self.next() else {
            return Err(FormulaError::UnexpectedEof);
        };
        match token {
            Token::True => Ok(Ltl::True),
            Token::False => Ok(Ltl::False),
            Token::Ident(name) => Ok(Ltl::Atom(name)),
            Token::LParen => {
                let inner = self.parse_implication()?;
                match self.next() {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(FormulaError::parse(
                        other.offset,
                        format!("expected ')', found {:?}", other.token),
                    )),
                    None => Err(FormulaError::parse(self.end, "unclosed '('")),
                }
            }
            other => Err(FormulaError::parse(
                offset,
                format!("expected operand, found {other:?}"),
            )),
        }
    }
}
