//! Agent-role placeholders in formula text.
//!
//! A proposition written `name#<n>` is bound to the agent in role slot `n`
//! when the rule is instantiated. Stripping the suffixes yields the text the
//! formula compiler sees.

use ltl_automaton::{is_ident_char, ALIVE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MonitorError;

/// Highest accepted role slot number.
pub const MAX_SLOT: usize = u16::MAX as usize;

/// One proposition of a rule's alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proposition {
    pub name: String,
    pub slot: Option<usize>,
}

impl Proposition {
    pub fn is_agent_specific(&self) -> bool {
        self.slot.is_some()
    }
}

/// Result of scanning a formula for placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFormula {
    /// Formula text with every `#<n>` suffix removed.
    pub agent_free: String,
    /// Propositions in first-appearance order, `alive` last.
    pub alphabet: Vec<Proposition>,
    pub agent_specific: bool,
}

impl ParsedFormula {
    /// Number of agent ids an instance needs: highest slot plus one.
    pub fn num_slots(&self) -> usize {
        self.alphabet
            .iter()
            .filter_map(|p| p.slot)
            .max()
            .map_or(0, |s| s + 1)
    }
}

/// Split `formula` into agent-free text and its proposition alphabet.
pub fn parse_placeholders(formula: &str) -> Result<ParsedFormula, MonitorError> {
    let bytes = formula.as_bytes();
    let mut agent_free = String::with_capacity(formula.len());
    let mut alphabet: Vec<Proposition> = Vec::new();
    let mut agent_specific = false;
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos] as char;
        if !is_ident_char(ch) {
            if ch == '#' {
                return Err(MonitorError::Placeholder {
                    offset: pos,
                    message: "placeholder without a proposition".into(),
                });
            }
            let len = formula[pos..].chars().next().map_or(1, char::len_utf8);
            agent_free.push_str(&formula[pos..pos + len]);
            pos += len;
            continue;
        }

        let start = pos;
        while pos < bytes.len() && is_ident_char(bytes[pos] as char) {
            pos += 1;
        }
        let name = &formula[start..pos];
        agent_free.push_str(name);

        let slot = if bytes.get(pos) == Some(&b'#') {
            let digits_start = pos + 1;
            let mut end = digits_start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end == digits_start {
                return Err(MonitorError::Placeholder {
                    offset: pos,
                    message: format!("'#' after '{name}' must be followed by a slot number"),
                });
            }
            let slot = formula[digits_start..end]
                .parse::<usize>()
                .ok()
                .filter(|&slot| slot <= MAX_SLOT)
                .ok_or_else(|| MonitorError::Placeholder {
                    offset: digits_start,
                    message: format!("slot number exceeds {MAX_SLOT}"),
                })?;
            pos = end;
            Some(slot)
        } else {
            None
        };

        if is_constant(name) {
            if slot.is_some() {
                return Err(MonitorError::Placeholder {
                    offset: start,
                    message: format!("constant '{name}' cannot carry a placeholder"),
                });
            }
            continue;
        }

        agent_specific |= slot.is_some();
        push_unique(
            &mut alphabet,
            Proposition {
                name: name.to_string(),
                slot,
            },
        )?;
    }

    push_unique(
        &mut alphabet,
        Proposition {
            name: ALIVE.to_string(),
            slot: None,
        },
    )?;
    // keep alive last even if the formula mentions it
    if let Some(idx) = alphabet.iter().position(|p| p.name == ALIVE) {
        let alive = alphabet.remove(idx);
        alphabet.push(alive);
    }

    debug!(formula = %formula, cleaned = %agent_free, agent_specific, "parsed placeholders");
    Ok(ParsedFormula {
        agent_free,
        alphabet,
        agent_specific,
    })
}

fn is_constant(word: &str) -> bool {
    matches!(word, "true" | "false") || word.bytes().all(|b| b.is_ascii_digit())
}

fn push_unique(alphabet: &mut Vec<Proposition>, prop: Proposition) -> Result<(), MonitorError> {
    match alphabet.iter().find(|p| p.name == prop.name) {
        Some(existing) if existing.slot == prop.slot => Ok(()),
        Some(_) => Err(MonitorError::AmbiguousProposition { name: prop.name }),
        None => {
            alphabet.push(prop);
            Ok(())
        }
    }
}
