//! Precomputed step tables for walking a function's symmetry orbit.
//!
//! Input negations are visited in reflected Gray-code order, so each step
//! negates exactly one variable. Input permutations are visited in "plain
//! changes" order (Knuth, TAOCP 7.2.1.2, Algorithm P), so each step swaps two
//! adjacent variables. Both sequences end with the step that returns to the
//! identity, which is what lets callers check that a sweep closed.
//!
//! Both steps are expressed as mask-and-shift bit moves on the truth table,
//! so applying one costs a handful of word operations.

use itertools::Itertools;

use crate::error::InvariantViolation;
use crate::func::{Func, Universe};

/// Negates one input variable: `(f & mask) << shift | (f >> shift) & mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegateStep {
    pub mask: u32,
    pub shift: u32,
}

impl NegateStep {
    fn new(universe: &Universe, var: usize) -> Self {
        let mask = (0..universe.inputs())
            .filter(|k| (k >> var) & 1 == 0)
            .fold(0u32, |m, k| m | (1 << k));
        Self {
            mask,
            shift: 1 << var,
        }
    }

    #[inline]
    pub const fn apply(&self, f: Func) -> Func {
        Func(((f.0 & self.mask) << self.shift) | ((f.0 >> self.shift) & self.mask))
    }
}

/// Swaps input variables `j` and `j + 1`:
/// `f & keep | (f & mask) << shift | (f >> shift) & mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub keep: u32,
    pub mask: u32,
    pub shift: u32,
}

impl SwapStep {
    fn new(universe: &Universe, j: usize) -> Self {
        let mut keep = 0u32;
        let mut mask = 0u32;
        for k in 0..universe.inputs() {
            let lo = (k >> j) & 1;
            let hi = (k >> (j + 1)) & 1;
            if lo == hi {
                keep |= 1 << k;
            } else if lo == 1 {
                mask |= 1 << k;
            }
        }
        Self {
            keep,
            mask,
            shift: 1 << j,
        }
    }

    #[inline]
    pub const fn apply(&self, f: Func) -> Func {
        Func(
            (f.0 & self.keep)
                | ((f.0 & self.mask) << self.shift)
                | ((f.0 >> self.shift) & self.mask),
        )
    }
}

/// Variable to negate at each step of a closed Gray-code cycle over `n` bits.
///
/// Yields `2^n` items: the ruler sequence for steps `1..2^n`, then `n - 1`,
/// which brings the code back to zero.
#[derive(Debug, Clone)]
pub struct GrayFlips {
    n: usize,
    step: u64,
}

impl GrayFlips {
    pub const fn new(n: usize) -> Self {
        Self { n, step: 0 }
    }
}

impl Iterator for GrayFlips {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let len = 1u64 << self.n;
        if self.n == 0 || self.step >= len {
            return None;
        }
        self.step += 1;
        if self.step == len {
            Some(self.n - 1)
        } else {
            Some(self.step.trailing_zeros() as usize)
        }
    }
}

/// Adjacent transpositions that run through all `n!` permutations.
///
/// Each item `j` means "swap positions `j` and `j + 1`". The final item
/// undoes the last permutation so the whole sequence composes to the
/// identity.
#[derive(Debug, Clone)]
pub struct PlainChanges {
    c: Vec<usize>,
    o: Vec<isize>,
    done: bool,
}

impl PlainChanges {
    pub fn new(n: usize) -> Self {
        Self {
            c: vec![0; n],
            o: vec![1; n],
            done: n == 0,
        }
    }
}

impl Iterator for PlainChanges {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        let mut j = self.c.len();
        let mut s = 0usize;
        loop {
            let q = self.c[j - 1] as isize + self.o[j - 1];
            if q >= 0 && q as usize == j {
                if j == 1 {
                    // Final swap back to the identity.
                    self.done = true;
                    return Some(0);
                }
                s += 1;
            }
            if q < 0 || q as usize == j {
                self.o[j - 1] = -self.o[j - 1];
                j -= 1;
                continue;
            }
            let q = q as usize;
            let x = j - self.c[j - 1] + s;
            let y = j - q + s;
            self.c[j - 1] = q;
            return Some(x.min(y) - 1);
        }
    }
}

/// The full orbit walk for one universe, computed once.
#[derive(Debug, Clone)]
pub struct Transforms {
    negations: Vec<NegateStep>,
    swaps: Vec<SwapStep>,
}

impl Transforms {
    pub fn new(universe: &Universe) -> Result<Self, InvariantViolation> {
        let n = universe.vars();
        let flips: Vec<usize> = GrayFlips::new(n).collect();
        let transpositions: Vec<usize> = PlainChanges::new(n).collect();
        check_gray_cycle(n, &flips)?;
        check_permutation_cycle(n, &transpositions)?;

        let negate: Vec<NegateStep> = (0..n).map(|i| NegateStep::new(universe, i)).collect();
        let swap: Vec<SwapStep> = (0..n - 1).map(|j| SwapStep::new(universe, j)).collect();

        Ok(Self {
            negations: flips.into_iter().map(|i| negate[i]).collect(),
            swaps: transpositions.into_iter().map(|j| swap[j]).collect(),
        })
    }

    pub fn negations(&self) -> &[NegateStep] {
        &self.negations
    }

    pub fn swaps(&self) -> &[SwapStep] {
        &self.swaps
    }

    /// Number of distinct transforms walked, output complement excluded.
    pub const fn orbit_bound(&self) -> usize {
        self.negations.len() * self.swaps.len()
    }
}

fn check_gray_cycle(n: usize, flips: &[usize]) -> Result<(), InvariantViolation> {
    if flips.len() != 1 << n {
        return Err(InvariantViolation::TransformTable(format!(
            "gray sequence has {} steps, expected {}",
            flips.len(),
            1u64 << n
        )));
    }
    let mut code = 0u64;
    let mut seen = vec![false; 1 << n];
    for &i in flips {
        code ^= 1 << i;
        seen[code as usize] = true;
    }
    if code != 0 || seen.iter().any(|s| !s) {
        return Err(InvariantViolation::TransformTable(
            "gray sequence does not cycle through every negation".to_string(),
        ));
    }
    Ok(())
}

fn check_permutation_cycle(n: usize, transpositions: &[usize]) -> Result<(), InvariantViolation> {
    let expected: usize = (1..=n).product();
    if transpositions.len() != expected {
        return Err(InvariantViolation::TransformTable(format!(
            "plain changes produced {} steps, expected {expected}",
            transpositions.len()
        )));
    }
    let identity: Vec<usize> = (0..n).collect();
    let mut perm = identity.clone();
    let mut seen = Vec::with_capacity(expected);
    for &j in transpositions {
        perm.swap(j, j + 1);
        seen.push(perm.clone());
    }
    if perm != identity || seen.into_iter().unique().count() != expected {
        return Err(InvariantViolation::TransformTable(
            "plain changes do not cycle through every permutation".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_flips_are_the_closed_ruler_sequence() {
        let flips: Vec<usize> = GrayFlips::new(3).collect();
        assert_eq!(flips, vec![0, 1, 0, 2, 0, 1, 0, 2]);
    }

    #[test]
    fn plain_changes_small_cases() {
        assert_eq!(PlainChanges::new(2).collect::<Vec<_>>(), vec![0, 0]);
        assert_eq!(
            PlainChanges::new(3).collect::<Vec<_>>(),
            vec![1, 0, 1, 0, 1, 0]
        );
        assert_eq!(PlainChanges::new(4).count(), 24);
        assert_eq!(PlainChanges::new(5).count(), 120);
    }

    #[test]
    fn tables_close_for_every_supported_universe() {
        for vars in Universe::MIN_VARS..=Universe::MAX_VARS {
            let u = Universe::new(vars).expect("supported");
            let t = Transforms::new(&u).expect("closed cycles");
            assert_eq!(t.negations().len(), 1 << vars);

            let f = Func(0x1234_5678 & u.all().0);
            let mut g = f;
            for step in t.swaps() {
                g = step.apply(g);
            }
            assert_eq!(g, f);
            for step in t.negations() {
                g = step.apply(g);
            }
            assert_eq!(g, f);
        }
    }

    #[test]
    fn negating_a_literal_complements_it() {
        let u = Universe::new(4).expect("four variables");
        for i in 0..4 {
            let step = NegateStep::new(&u, i);
            assert_eq!(step.apply(u.literal(i)), u.complement(u.literal(i)));
            for j in (0..4).filter(|&j| j != i) {
                assert_eq!(step.apply(u.literal(j)), u.literal(j));
            }
        }
    }

    #[test]
    fn swapping_exchanges_adjacent_literals() {
        let u = Universe::new(4).expect("four variables");
        let step = SwapStep::new(&u, 1);
        assert_eq!(step.apply(u.literal(1)), u.literal(2));
        assert_eq!(step.apply(u.literal(2)), u.literal(1));
        assert_eq!(step.apply(u.literal(0)), u.literal(0));
        assert_eq!(step.apply(u.literal(3)), u.literal(3));
    }
}
