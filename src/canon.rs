//! NPN canonicalization.
//!
//! The canonical form of `f` is the smallest value reachable from `f` by
//! negating any subset of inputs, permuting inputs, and complementing the
//! output. Output complement is folded in at every step by clearing the top
//! truth-table bit, so canonical forms always have that bit clear.

use crate::error::InvariantViolation;
use crate::func::{Func, Record, Universe};
use crate::transform::Transforms;

/// Callbacks for [`Canonicalizer::walk`].
///
/// `vals[0]` is the function being walked; any further entries are
/// witnesses that undergo the same input transforms. Values are handed over
/// untouched by output folding; use [`Universe::fold_output`] to fold them.
pub trait OrbitWalk<const N: usize> {
    /// Called after each negation step. Returning `false` skips the
    /// permutation sweep for this negation.
    fn enter(&mut self, _vals: &[Func; N]) -> bool {
        true
    }

    /// Called after every permutation step, the identity permutation last.
    fn member(&mut self, vals: &mut [Func; N]);
}

#[derive(Debug, Clone)]
pub struct Canonicalizer {
    universe: Universe,
    transforms: Transforms,
}

impl Canonicalizer {
    pub fn new(universe: Universe) -> Result<Self, InvariantViolation> {
        let transforms = Transforms::new(&universe)?;
        Ok(Self {
            universe,
            transforms,
        })
    }

    pub const fn universe(&self) -> &Universe {
        &self.universe
    }

    pub const fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    /// Applies every negation/permutation pair to `vals`, reporting each
    /// member of the orbit to `walker`.
    ///
    /// Returns the values as they stand after the walk. `vals[0]` always
    /// ends where it started; the witnesses do too unless `walker` rewrote
    /// them.
    pub fn walk<const N: usize, W>(
        &self,
        mut vals: [Func; N],
        walker: &mut W,
    ) -> Result<[Func; N], InvariantViolation>
    where
        W: OrbitWalk<N>,
    {
        let start = vals[0];
        for neg in self.transforms.negations() {
            for v in vals.iter_mut() {
                *v = neg.apply(*v);
            }
            if !walker.enter(&vals) {
                continue;
            }

            let sweep_start = vals[0];
            for swap in self.transforms.swaps() {
                for v in vals.iter_mut() {
                    *v = swap.apply(*v);
                }
                walker.member(&mut vals);
            }
            if vals[0] != sweep_start {
                return Err(InvariantViolation::PermutationCycleOpen {
                    start: sweep_start,
                    end: vals[0],
                });
            }
        }
        if vals[0] != start {
            return Err(InvariantViolation::NegationCycleOpen {
                start,
                end: vals[0],
            });
        }
        Ok(vals)
    }

    /// Returns the canonical form of `f`.
    pub fn canonical(&self, f: Func) -> Result<Func, InvariantViolation> {
        let mut min = MinOf {
            universe: &self.universe,
            best: [self.universe.fold_output(f).0],
        };
        self.walk([f], &mut min)?;
        Ok(min.best[0])
    }

    /// Returns the canonical form of `f` with `p` and `q` carried through
    /// the transform that produced it.
    pub fn canonicalize(&self, f: Func, p: Func, q: Func) -> Result<Record, InvariantViolation> {
        let (f0, mask) = self.universe.fold_output(f);
        let mut min = MinOf {
            universe: &self.universe,
            best: [f0, Func(p.0 ^ mask), Func(q.0 ^ mask)],
        };
        self.walk([f, p, q], &mut min)?;
        let [f, p, q] = min.best;
        Ok(Record::new(f, p, q))
    }

    /// Collects the orbit of `f`, folded to the top-bit-clear half.
    pub fn orbit(&self, f: Func) -> Result<Vec<Func>, InvariantViolation> {
        let mut members = Orbit {
            universe: &self.universe,
            members: Vec::with_capacity(self.transforms.orbit_bound()),
        };
        self.walk([f], &mut members)?;
        let mut out = members.members;
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }
}

struct MinOf<'a, const N: usize> {
    universe: &'a Universe,
    best: [Func; N],
}

impl<const N: usize> OrbitWalk<N> for MinOf<'_, N> {
    fn member(&mut self, vals: &mut [Func; N]) {
        let (fc, mask) = self.universe.fold_output(vals[0]);
        if fc < self.best[0] {
            for (b, v) in self.best.iter_mut().zip(vals.iter()) {
                *b = Func(v.0 ^ mask);
            }
        }
    }
}

struct Orbit<'a> {
    universe: &'a Universe,
    members: Vec<Func>,
}

impl OrbitWalk<1> for Orbit<'_> {
    fn member(&mut self, vals: &mut [Func; 1]) {
        self.members.push(self.universe.fold_output(vals[0]).0);
    }
}
