//! Formula syntax tree and its negation normal form.

use std::fmt;
use std::rc::Rc;

use crate::error::FormulaError;
use crate::guard::VarId;

/// Parsed LTLf formula, exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ltl {
    True,
    False,
    Atom(String),
    Not(Box<Ltl>),
    And(Box<Ltl>, Box<Ltl>),
    Or(Box<Ltl>, Box<Ltl>),
    Xor(Box<Ltl>, Box<Ltl>),
    Implies(Box<Ltl>, Box<Ltl>),
    Iff(Box<Ltl>, Box<Ltl>),
    /// Weak next: holds on the last position.
    Next(Box<Ltl>),
    /// Strong next: requires a successor position.
    StrongNext(Box<Ltl>),
    Finally(Box<Ltl>),
    Globally(Box<Ltl>),
    Until(Box<Ltl>, Box<Ltl>),
    WeakUntil(Box<Ltl>, Box<Ltl>),
    Release(Box<Ltl>, Box<Ltl>),
    StrongRelease(Box<Ltl>, Box<Ltl>),
}

impl Ltl {
    /// Proposition names in first-appearance order, without duplicates.
    pub fn atoms(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<String>) {
        match self {
            Ltl::True | Ltl::False => {}
            Ltl::Atom(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Ltl::Not(a)
            | Ltl::Next(a)
            | Ltl::StrongNext(a)
            | Ltl::Finally(a)
            | Ltl::Globally(a) => a.collect_atoms(out),
            Ltl::And(a, b)
            | Ltl::Or(a, b)
            | Ltl::Xor(a, b)
            | Ltl::Implies(a, b)
            | Ltl::Iff(a, b)
            | Ltl::Until(a, b)
            | Ltl::WeakUntil(a, b)
            | Ltl::Release(a, b)
            | Ltl::StrongRelease(a, b) => {
                a.collect_atoms(out);
                b.collect_atoms(out);
            }
        }
    }

    /// Push negations down to the literals and rewrite derived operators.
    ///
    /// `var_of` maps each proposition name to its automaton variable.
    pub fn to_nnf<F>(&self, var_of: &F) -> Result<Rc<Nnf>, FormulaError>
    where
        F: Fn(&str) -> Option<VarId>,
    {
        self.nnf(true, var_of)
    }

    fn nnf<F>(&self, positive: bool, var_of: &F) -> Result<Rc<Nnf>, FormulaError>
    where
        F: Fn(&str) -> Option<VarId>,
    {
        let node = match self {
            Ltl::True => Nnf::constant(positive),
            Ltl::False => Nnf::constant(!positive),
            Ltl::Atom(name) => {
                let var = var_of(name)
                    .ok_or_else(|| FormulaError::UnknownProposition(name.clone()))?;
                Rc::new(Nnf::Lit { var, positive })
            }
            Ltl::Not(a) => a.nnf(!positive, var_of)?,
            Ltl::And(a, b) => {
                let (a, b) = (a.nnf(positive, var_of)?, b.nnf(positive, var_of)?);
                if positive {
                    Nnf::and(a, b)
                } else {
                    Nnf::or(a, b)
                }
            }
            Ltl::Or(a, b) => {
                let (a, b) = (a.nnf(positive, var_of)?, b.nnf(positive, var_of)?);
                if positive {
                    Nnf::or(a, b)
                } else {
                    Nnf::and(a, b)
                }
            }
            Ltl::Implies(a, b) => {
                // a -> b  ==  !a | b
                let lhs = a.nnf(!positive, var_of)?;
                let rhs = b.nnf(positive, var_of)?;
                if positive {
                    Nnf::or(lhs, rhs)
                } else {
                    Nnf::and(lhs, rhs)
                }
            }
            Ltl::Iff(a, b) | Ltl::Xor(a, b) => {
                let same = matches!(self, Ltl::Iff(..)) == positive;
                let (pa, pb) = (a.nnf(true, var_of)?, b.nnf(true, var_of)?);
                let (na, nb) = (a.nnf(false, var_of)?, b.nnf(false, var_of)?);
                if same {
                    Nnf::or(Nnf::and(pa, pb), Nnf::and(na, nb))
                } else {
                    Nnf::or(Nnf::and(pa, nb), Nnf::and(na, pb))
                }
            }
            Ltl::Next(a) => Nnf::next(!positive, a.nnf(positive, var_of)?),
            Ltl::StrongNext(a) => Nnf::next(positive, a.nnf(positive, var_of)?),
            Ltl::Finally(a) => {
                let inner = a.nnf(positive, var_of)?;
                if positive {
                    Nnf::finally(inner)
                } else {
                    Nnf::globally(inner)
                }
            }
            Ltl::Globally(a) => {
                let inner = a.nnf(positive, var_of)?;
                if positive {
                    Nnf::globally(inner)
                } else {
                    Nnf::finally(inner)
                }
            }
            Ltl::Until(a, b) => {
                let (a, b) = (a.nnf(positive, var_of)?, b.nnf(positive, var_of)?);
                if positive {
                    Nnf::until(a, b)
                } else {
                    Nnf::release(a, b)
                }
            }
            Ltl::Release(a, b) => {
                let (a, b) = (a.nnf(positive, var_of)?, b.nnf(positive, var_of)?);
                if positive {
                    Nnf::release(a, b)
                } else {
                    Nnf::until(a, b)
                }
            }
            Ltl::WeakUntil(a, b) => {
                // a W b  ==  b R (a | b)
                // !(a W b)  ==  !b U (!a & !b)
                let (a, b) = (a.nnf(positive, var_of)?, b.nnf(positive, var_of)?);
                if positive {
                    Nnf::release(b.clone(), Nnf::or(a, b))
                } else {
                    Nnf::until(b.clone(), Nnf::and(a, b))
                }
            }
            Ltl::StrongRelease(a, b) => {
                // a M b  ==  b U (a & b)
                // !(a M b)  ==  !b R (!a | !b)
                let (a, b) = (a.nnf(positive, var_of)?, b.nnf(positive, var_of)?);
                if positive {
                    Nnf::until(b.clone(), Nnf::and(a, b))
                } else {
                    Nnf::release(b.clone(), Nnf::or(a, b))
                }
            }
        };
        Ok(node)
    }
}

impl fmt::Display for Ltl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ltl::True => write!(f, "true"),
            Ltl::False => write!(f, "false"),
            Ltl::Atom(name) => write!(f, "{name}"),
            Ltl::Not(a) => write!(f, "!{a}"),
            Ltl::And(a, b) => write!(f, "({a} & {b})"),
            Ltl::Or(a, b) => write!(f, "({a} | {b})"),
            Ltl::Xor(a, b) => write!(f, "({a} ^ {b})"),
            Ltl::Implies(a, b) => write!(f, "({a} -> {b})"),
            Ltl::Iff(a, b) => write!(f, "({a} <-> {b})"),
            Ltl::Next(a) => write!(f, "X {a}"),
            Ltl::StrongNext(a) => write!(f, "X[!] {a}"),
            Ltl::Finally(a) => write!(f, "F {a}"),
            Ltl::Globally(a) => write!(f, "G {a}"),
            Ltl::Until(a, b) => write!(f, "({a} U {b})"),
            Ltl::WeakUntil(a, b) => write!(f, "({a} W {b})"),
            Ltl::Release(a, b) => write!(f, "({a} R {b})"),
            Ltl::StrongRelease(a, b) => write!(f, "({a} M {b})"),
        }
    }
}

/// Negation normal form over automaton variables.
///
/// Only literals carry negation. `W` and `M` are rewritten into `R` and `U`;
/// the boolean shorthands into `&` and `|`. Constant operands are folded by
/// the smart constructors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Nnf {
    True,
    False,
    Lit { var: VarId, positive: bool },
    And(Rc<Nnf>, Rc<Nnf>),
    Or(Rc<Nnf>, Rc<Nnf>),
    Next { strong: bool, inner: Rc<Nnf> },
    Finally(Rc<Nnf>),
    Globally(Rc<Nnf>),
    Until(Rc<Nnf>, Rc<Nnf>),
    Release(Rc<Nnf>, Rc<Nnf>),
}

impl Nnf {
    pub fn constant(value: bool) -> Rc<Nnf> {
        Rc::new(if value { Nnf::True } else { Nnf::False })
    }

    pub fn and(a: Rc<Nnf>, b: Rc<Nnf>) -> Rc<Nnf> {
        match (&*a, &*b) {
            (Nnf::False, _) | (_, Nnf::True) => a,
            (_, Nnf::False) | (Nnf::True, _) => b,
            _ if a == b => a,
            _ => Rc::new(Nnf::And(a, b)),
        }
    }

    pub fn or(a: Rc<Nnf>, b: Rc<Nnf>) -> Rc<Nnf> {
        match (&*a, &*b) {
            (Nnf::True, _) | (_, Nnf::False) => a,
            (_, Nnf::True) | (Nnf::False, _) => b,
            _ if a == b => a,
            _ => Rc::new(Nnf::Or(a, b)),
        }
    }

    pub fn next(strong: bool, inner: Rc<Nnf>) -> Rc<Nnf> {
        match (&*inner, strong) {
            (Nnf::True, false) => inner,
            (Nnf::False, true) => inner,
            _ => Rc::new(Nnf::Next { strong, inner }),
        }
    }

    pub fn finally(inner: Rc<Nnf>) -> Rc<Nnf> {
        match &*inner {
            Nnf::True | Nnf::False | Nnf::Finally(_) => inner,
            _ => Rc::new(Nnf::Finally(inner)),
        }
    }

    pub fn globally(inner: Rc<Nnf>) -> Rc<Nnf> {
        match &*inner {
            Nnf::True | Nnf::False | Nnf::Globally(_) => inner,
            _ => Rc::new(Nnf::Globally(inner)),
        }
    }

    pub fn until(a: Rc<Nnf>, b: Rc<Nnf>) -> Rc<Nnf> {
        match (&*a, &*b) {
            (_, Nnf::True) | (_, Nnf::False) | (Nnf::False, _) => b,
            (Nnf::True, _) => Nnf::finally(b),
            _ => Rc::new(Nnf::Until(a, b)),
        }
    }

    pub fn release(a: Rc<Nnf>, b: Rc<Nnf>) -> Rc<Nnf> {
        match (&*a, &*b) {
            (_, Nnf::True) | (_, Nnf::False) | (Nnf::True, _) => b,
            (Nnf::False, _) => Nnf::globally(b),
            _ => Rc::new(Nnf::Release(a, b)),
        }
    }

    /// True when no eventuality (`F`, `U`) occurs anywhere in the formula.
    pub fn is_syntactic_safety(&self) -> bool {
        match self {
            Nnf::True | Nnf::False | Nnf::Lit { .. } => true,
            Nnf::Finally(_) | Nnf::Until(..) => false,
            Nnf::Next { inner, .. } | Nnf::Globally(inner) => inner.is_syntactic_safety(),
            Nnf::And(a, b) | Nnf::Or(a, b) | Nnf::Release(a, b) => {
                a.is_syntactic_safety() && b.is_syntactic_safety()
            }
        }
    }
}
