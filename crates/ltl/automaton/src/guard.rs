//! Edge guards and their three-valued evaluation.
//!
//! A guard is a boolean function over a small sorted set of automaton
//! variables, stored as a truth table. Evaluation against a partial
//! assignment answers `True` or `False` only when every completion of the
//! unassigned variables agrees.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of an automaton variable.
pub type VarId = usize;

/// Maximum number of variables an [`Assignment`] can hold.
pub const MAX_VARS: usize = 64;

/// Three-valued truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tri {
    True,
    False,
    Undef,
}

impl From<bool> for Tri {
    fn from(value: bool) -> Self {
        if value {
            Tri::True
        } else {
            Tri::False
        }
    }
}

impl fmt::Display for Tri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tri::True => write!(f, "true"),
            Tri::False => write!(f, "false"),
            Tri::Undef => write!(f, "undef"),
        }
    }
}

/// Partial assignment of boolean values to variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Assignment {
    known: u64,
    values: u64,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `var`, overwriting any earlier value.
    pub fn set(&mut self, var: VarId, value: bool) {
        debug_assert!(var < MAX_VARS);
        let bit = 1u64 << var;
        self.known |= bit;
        if value {
            self.values |= bit;
        } else {
            self.values &= !bit;
        }
    }

    pub fn with(mut self, var: VarId, value: bool) -> Self {
        self.set(var, value);
        self
    }

    pub fn get(&self, var: VarId) -> Option<bool> {
        let bit = 1u64 << var;
        (self.known & bit != 0).then_some(self.values & bit != 0)
    }

    pub fn is_assigned(&self, var: VarId) -> bool {
        self.get(var).is_some()
    }
}

/// Boolean function over a sorted variable support.
///
/// Row `r` of the table assigns `support[j]` the value of bit `j` of `r`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Guard {
    support: Vec<VarId>,
    table: Vec<u64>,
}

impl Guard {
    pub fn constant(value: bool) -> Self {
        Self {
            support: Vec::new(),
            table: vec![u64::from(value)],
        }
    }

    pub fn literal(var: VarId, positive: bool) -> Self {
        // rows: var=0 -> bit 0, var=1 -> bit 1
        let table = if positive { 0b10 } else { 0b01 };
        Self {
            support: vec![var],
            table: vec![table],
        }
    }

    /// Tabulate `f` over every assignment of `vars`. Bit `j` of the row
    /// passed to `f` is the value of `vars[j]`. Variables the function does
    /// not depend on are dropped from the support.
    pub fn from_fn<F>(vars: &[VarId], f: F) -> Self
    where
        F: Fn(u64) -> bool,
    {
        let mut order: Vec<usize> = (0..vars.len()).collect();
        order.sort_by_key(|&j| vars[j]);
        let support: Vec<VarId> = order.iter().map(|&j| vars[j]).collect();

        let rows = 1usize << support.len();
        let mut table = vec![0u64; rows.div_ceil(64)];
        for row in 0..rows {
            // translate the sorted row back into caller order
            let mut caller_row = 0u64;
            for (sorted_pos, &j) in order.iter().enumerate() {
                if row >> sorted_pos & 1 == 1 {
                    caller_row |= 1 << j;
                }
            }
            if f(caller_row) {
                table[row / 64] |= 1 << (row % 64);
            }
        }
        Self { support, table }.reduced()
    }

    /// Variables this guard depends on, ascending.
    pub fn support(&self) -> &[VarId] {
        &self.support
    }

    pub fn is_constant(&self) -> Option<bool> {
        if self.support.is_empty() {
            Some(self.row(0))
        } else {
            None
        }
    }

    fn rows(&self) -> usize {
        1 << self.support.len()
    }

    fn row(&self, row: usize) -> bool {
        self.table[row / 64] >> (row % 64) & 1 == 1
    }

    fn reduced(self) -> Self {
        let mut current = self;
        let mut j = 0;
        while j < current.support.len() {
            if current.depends_on(j) {
                j += 1;
            } else {
                current = current.without(j);
            }
        }
        current
    }

    fn depends_on(&self, j: usize) -> bool {
        let bit = 1usize << j;
        (0..self.rows())
            .filter(|row| row & bit == 0)
            .any(|row| self.row(row) != self.row(row | bit))
    }

    fn without(&self, j: usize) -> Self {
        let mut support = self.support.clone();
        support.remove(j);
        let rows = 1usize << support.len();
        let low = (1usize << j) - 1;
        let mut table = vec![0u64; rows.div_ceil(64)];
        for row in 0..rows {
            let old = (row & low) | ((row & !low) << 1);
            if self.row(old) {
                table[row / 64] |= 1 << (row % 64);
            }
        }
        Self { support, table }
    }

    /// Evaluate against a partial assignment.
    pub fn evaluate(&self, assignment: &Assignment) -> Tri {
        let mut mask = 0usize;
        let mut fixed = 0usize;
        for (j, &var) in self.support.iter().enumerate() {
            if let Some(value) = assignment.get(var) {
                mask |= 1 << j;
                if value {
                    fixed |= 1 << j;
                }
            }
        }

        let mut seen_true = false;
        let mut seen_false = false;
        for row in (0..self.rows()).filter(|row| row & mask == fixed) {
            if self.row(row) {
                seen_true = true;
            } else {
                seen_false = true;
            }
            if seen_true && seen_false {
                return Tri::Undef;
            }
        }
        Tri::from(seen_true)
    }

    /// Render as a sum of products over `names`, indexed by variable.
    pub fn render(&self, names: &[String]) -> String {
        if let Some(value) = self.is_constant() {
            return if value { "1" } else { "0" }.to_string();
        }

        let minterms: Vec<usize> = (0..self.rows()).filter(|&r| self.row(r)).collect();
        if minterms.len() == self.rows() {
            return "1".to_string();
        }
        if minterms.is_empty() {
            return "0".to_string();
        }

        let cover = minimal_cover(&minterms, self.support.len());
        let name_of = |var: VarId| {
            names
                .get(var)
                .cloned()
                .unwrap_or_else(|| format!("v{var}"))
        };
        let products: Vec<String> = cover
            .iter()
            .map(|cube| {
                let lits: Vec<String> = (0..self.support.len())
                    .filter(|j| cube.care >> j & 1 == 1)
                    .map(|j| {
                        let name = name_of(self.support[j]);
                        if cube.value >> j & 1 == 1 {
                            name
                        } else {
                            format!("!{name}")
                        }
                    })
                    .collect();
                lits.join(" & ")
            })
            .collect();

        if products.len() == 1 {
            return products.into_iter().collect();
        }
        products
            .into_iter()
            .map(|p| if p.contains(" & ") { format!("({p})") } else { p })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = Vec::new();
        write!(f, "{}", self.render(&names))
    }
}

/// Product term: the bits set in `care` are fixed to the bits of `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Cube {
    care: usize,
    value: usize,
}

impl Cube {
    fn covers(&self, minterm: usize) -> bool {
        minterm & self.care == self.value
    }
}

/// Prime implicants by Quine-McCluskey merging, then a greedy cover.
fn minimal_cover(minterms: &[usize], width: usize) -> Vec<Cube> {
    use std::collections::BTreeSet;

    let full = (1usize << width) - 1;
    let mut current: BTreeSet<Cube> = minterms
        .iter()
        .map(|&m| Cube {
            care: full,
            value: m,
        })
        .collect();
    let mut primes: BTreeSet<Cube> = BTreeSet::new();

    while !current.is_empty() {
        let mut merged: BTreeSet<Cube> = BTreeSet::new();
        let mut used: BTreeSet<Cube> = BTreeSet::new();
        let cubes: Vec<Cube> = current.iter().copied().collect();
        for (i, a) in cubes.iter().enumerate() {
            for b in &cubes[i + 1..] {
                if a.care != b.care {
                    continue;
                }
                let diff = a.value ^ b.value;
                if diff.count_ones() == 1 {
                    merged.insert(Cube {
                        care: a.care & !diff,
                        value: a.value & !diff,
                    });
                    used.insert(*a);
                    used.insert(*b);
                }
            }
        }
        primes.extend(cubes.into_iter().filter(|c| !used.contains(c)));
        current = merged;
    }

    let mut uncovered: BTreeSet<usize> = minterms.iter().copied().collect();
    let mut chosen = Vec::new();
    while !uncovered.is_empty() {
        let best = primes
            .iter()
            .max_by_key(|p| {
                let gain = uncovered.iter().filter(|&&m| p.covers(m)).count();
                // prefer fewer literals, then the earliest cube
                (gain, std::cmp::Reverse(p.care.count_ones()), std::cmp::Reverse(**p))
            })
            .copied();
        let Some(best) = best else { break };
        if !uncovered.iter().any(|&m| best.covers(m)) {
            break;
        }
        uncovered.retain(|&m| !best.covers(m));
        chosen.push(best);
    }
    chosen.sort_by_key(|c| std::cmp::Reverse(c.value));
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["alive", "a", "b", "c"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn constant_guards() {
        let t = Guard::constant(true);
        assert_eq!(t.evaluate(&Assignment::new()), Tri::True);
        assert_eq!(Guard::constant(false).evaluate(&Assignment::new()), Tri::False);
        assert_eq!(t.render(&names()), "1");
    }

    #[test]
    fn literal_with_and_without_value() {
        let g = Guard::literal(1, false);
        assert_eq!(g.evaluate(&Assignment::new()), Tri::Undef);
        assert_eq!(g.evaluate(&Assignment::new().with(1, false)), Tri::True);
        assert_eq!(g.evaluate(&Assignment::new().with(1, true)), Tri::False);
        assert_eq!(g.render(&names()), "!a");
    }

    #[test]
    fn conjunction_is_false_once_one_side_is_false() {
        let g = Guard::from_fn(&[0, 1], |row| row == 0b11);
        assert_eq!(g.support(), &[0, 1]);
        assert_eq!(g.evaluate(&Assignment::new().with(0, false)), Tri::False);
        assert_eq!(g.evaluate(&Assignment::new().with(0, true)), Tri::Undef);
        assert_eq!(
            g.evaluate(&Assignment::new().with(0, true).with(1, true)),
            Tri::True
        );
    }

    #[test]
    fn unused_variables_are_dropped() {
        // depends on var 2 only
        let g = Guard::from_fn(&[0, 2], |row| row & 0b10 != 0);
        assert_eq!(g.support(), &[2]);
        assert_eq!(g.evaluate(&Assignment::new().with(2, true)), Tri::True);
    }

    #[test]
    fn tautology_reduces_to_constant() {
        let g = Guard::from_fn(&[1, 2], |row| row & 1 == 1 || row & 1 == 0);
        assert_eq!(g.is_constant(), Some(true));
    }

    #[test]
    fn support_is_sorted_regardless_of_caller_order() {
        // f = v3 & !v1, with v3 given first
        let g = Guard::from_fn(&[3, 1], |row| row & 0b01 != 0 && row & 0b10 == 0);
        assert_eq!(g.support(), &[1, 3]);
        assert_eq!(g.evaluate(&Assignment::new().with(3, true).with(1, false)), Tri::True);
        assert_eq!(g.render(&names()), "!a & c");
    }

    #[test]
    fn render_sum_of_products() {
        // alive & (a | b)
        let g = Guard::from_fn(&[0, 1, 2], |row| row & 1 == 1 && row & 0b110 != 0);
        let text = g.render(&names());
        assert!(text == "(alive & a) | (alive & b)" || text == "(alive & b) | (alive & a)");
    }

    #[test]
    fn render_falls_back_to_indexed_names() {
        let g = Guard::literal(7, true);
        assert_eq!(g.render(&names()), "v7");
    }

    mod properties {
        use crate::guard::*;
        use proptest::prelude::*;

        proptest! {
            /// Three-valued evaluation agrees with enumerating every completion.
            #[test]
            fn evaluate_matches_completions(
                table in any::<u8>(),
                known in 0u64..8,
                values in 0u64..8,
            ) {
                let vars = [1, 2, 3];
                let g = Guard::from_fn(&vars, |row| table >> row & 1 == 1);
                let mut a = Assignment::new();
                for (j, &var) in vars.iter().enumerate() {
                    if known >> j & 1 == 1 {
                        a.set(var, values >> j & 1 == 1);
                    }
                }
                let outcomes: Vec<bool> = (0u64..8)
                    .filter(|row| row & known == values & known)
                    .map(|row| table >> row & 1 == 1)
                    .collect();
                let expected = if outcomes.iter().all(|&o| o) {
                    Tri::True
                } else if outcomes.iter().all(|&o| !o) {
                    Tri::False
                } else {
                    Tri::Undef
                };
                prop_assert_eq!(g.evaluate(&a), expected);
            }
        }
    }

    #[test]
    fn assignment_overwrites() {
        let mut a = Assignment::new();
        a.set(4, true);
        a.set(4, false);
        assert_eq!(a.get(4), Some(false));
        assert!(!a.is_assigned(5));
    }
}
