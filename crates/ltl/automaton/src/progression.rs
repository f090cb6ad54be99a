//! Formula progression over finite traces.
//!
//! The residual of a formula after reading one letter is kept as a DNF of
//! obligations on the rest of the trace. `Strong(f)` requires a non-empty
//! remainder satisfying `f`; `Weak(f)` is also met by the empty remainder.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::formula::Nnf;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Obligation {
    Strong(Rc<Nnf>),
    Weak(Rc<Nnf>),
}

impl Obligation {
    fn is_weak(&self) -> bool {
        matches!(self, Obligation::Weak(_))
    }

    fn is_end_marker(&self) -> bool {
        matches!(self, Obligation::Weak(f) if **f == Nnf::False)
    }
}

pub type Clause = BTreeSet<Obligation>;

/// Canonical disjunction of obligation clauses.
///
/// The empty DNF is unsatisfiable. A DNF holding the empty clause is valid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Dnf {
    clauses: BTreeSet<Clause>,
}

impl Dnf {
    pub fn bottom() -> Self {
        Self::default()
    }

    pub fn top() -> Self {
        let mut clauses = BTreeSet::new();
        clauses.insert(Clause::new());
        Self { clauses }
    }

    pub fn atom(obligation: Obligation) -> Self {
        let mut clause = Clause::new();
        clause.insert(obligation);
        Self::from_clauses(normalize(clause))
    }

    fn from_clauses(clauses: impl IntoIterator<Item = Clause>) -> Self {
        let all: BTreeSet<Clause> = clauses.into_iter().collect();
        // drop clauses that strictly contain another clause
        let clauses = all
            .iter()
            .filter(|c| !all.iter().any(|d| d != *c && d.is_subset(c)))
            .cloned()
            .collect();
        Self { clauses }
    }

    pub fn is_bottom(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    pub fn or(&self, other: &Dnf) -> Dnf {
        Self::from_clauses(self.clauses.iter().chain(&other.clauses).cloned())
    }

    pub fn and(&self, other: &Dnf) -> Dnf {
        let mut out = Vec::new();
        for a in &self.clauses {
            for b in &other.clauses {
                let merged: Clause = a.union(b).cloned().collect();
                out.extend(normalize(merged));
            }
        }
        Self::from_clauses(out)
    }

    /// Whether the empty remainder satisfies this DNF.
    pub fn accepts_empty(&self) -> bool {
        self.clauses.iter().any(|c| c.iter().all(Obligation::is_weak))
    }

    /// Residual after reading one letter. `holds(var, positive)` decides
    /// literals under that letter.
    pub fn step<F>(&self, holds: &F) -> Dnf
    where
        F: Fn(usize, bool) -> bool,
    {
        let mut result = Dnf::bottom();
        for clause in &self.clauses {
            let mut conj = Dnf::top();
            for obligation in clause {
                let formula = match obligation {
                    Obligation::Strong(f) | Obligation::Weak(f) => f,
                };
                conj = conj.and(&progress(formula, holds));
                if conj.is_bottom() {
                    break;
                }
            }
            result = result.or(&conj);
        }
        result
    }
}

/// Simplify a clause. `None` when it cannot be satisfied.
fn normalize(mut clause: Clause) -> Option<Clause> {
    clause.remove(&Obligation::Weak(Rc::new(Nnf::True)));
    if clause.contains(&Obligation::Strong(Rc::new(Nnf::False))) {
        return None;
    }
    if clause.iter().any(Obligation::is_end_marker) {
        if clause.iter().any(|o| !o.is_weak()) {
            return None;
        }
        // an empty remainder discharges every other weak obligation
        return Some(clause.into_iter().filter(Obligation::is_end_marker).collect());
    }
    Some(clause)
}

/// Obligations left on the remainder after `formula` reads one letter.
pub fn progress<F>(formula: &Rc<Nnf>, holds: &F) -> Dnf
where
    F: Fn(usize, bool) -> bool,
{
    match &**formula {
        Nnf::True => Dnf::top(),
        Nnf::False => Dnf::bottom(),
        Nnf::Lit { var, positive } => {
            if holds(*var, *positive) {
                Dnf::top()
            } else {
                Dnf::bottom()
            }
        }
        Nnf::And(a, b) => progress(a, holds).and(&progress(b, holds)),
        Nnf::Or(a, b) => progress(a, holds).or(&progress(b, holds)),
        Nnf::Next { strong, inner } => Dnf::atom(if *strong {
            Obligation::Strong(inner.clone())
        } else {
            Obligation::Weak(inner.clone())
        }),
        Nnf::Finally(a) => progress(a, holds).or(&Dnf::atom(Obligation::Strong(formula.clone()))),
        Nnf::Globally(a) => progress(a, holds).and(&Dnf::atom(Obligation::Weak(formula.clone()))),
        Nnf::Until(a, b) => {
            let stay = progress(a, holds).and(&Dnf::atom(Obligation::Strong(formula.clone())));
            progress(b, holds).or(&stay)
        }
        Nnf::Release(a, b) => {
            let release = progress(a, holds).or(&Dnf::atom(Obligation::Weak(formula.clone())));
            progress(b, holds).and(&release)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(var: usize) -> Rc<Nnf> {
        Rc::new(Nnf::Lit {
            var,
            positive: true,
        })
    }

    fn letter(bits: u64) -> impl Fn(usize, bool) -> bool {
        move |var, positive| (bits >> var & 1 == 1) == positive
    }

    #[test]
    fn strong_false_is_bottom_and_weak_true_is_top() {
        assert!(Dnf::atom(Obligation::Strong(Nnf::constant(false))).is_bottom());
        assert_eq!(Dnf::atom(Obligation::Weak(Nnf::constant(true))), Dnf::top());
    }

    #[test]
    fn end_marker_conflicts_with_strong() {
        let end = Dnf::atom(Obligation::Weak(Nnf::constant(false)));
        let more = Dnf::atom(Obligation::Strong(lit(1)));
        assert!(end.and(&more).is_bottom());
        assert!(end.accepts_empty());
    }

    #[test]
    fn absorption_keeps_smaller_clause() {
        let a = Dnf::atom(Obligation::Strong(lit(1)));
        let ab = a.and(&Dnf::atom(Obligation::Strong(lit(2))));
        assert_eq!(a.or(&ab), a);
    }

    #[test]
    fn globally_progresses_to_itself() {
        let g = Nnf::globally(lit(1));
        let state = Dnf::atom(Obligation::Weak(g.clone()));
        assert_eq!(state.step(&letter(0b10)), state);
        assert!(state.step(&letter(0b00)).is_bottom());
        assert!(state.accepts_empty());
    }

    #[test]
    fn finally_waits_then_discharges() {
        let f = Nnf::finally(lit(1));
        let state = Dnf::atom(Obligation::Strong(f));
        assert_eq!(state.step(&letter(0)), state);
        assert!(!state.accepts_empty());
        assert_eq!(state.step(&letter(0b10)), Dnf::top());
    }

    #[test]
    fn weak_next_on_last_position() {
        let x = Nnf::next(false, lit(1));
        let residual = progress(&x, &letter(0));
        assert!(residual.accepts_empty());
        assert!(residual.step(&letter(0)).is_bottom());
    }

    #[test]
    fn until_needs_right_side_eventually() {
        let u = Nnf::until(lit(1), lit(2));
        let state = Dnf::atom(Obligation::Strong(u));
        assert_eq!(state.step(&letter(0b010)), state);
        assert_eq!(state.step(&letter(0b100)), Dnf::top());
        assert!(state.step(&letter(0)).is_bottom());
    }
}
