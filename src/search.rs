//! Targeted search for the last functions of a level.
//!
//! Instead of combining all pairs and discarding the known results, each
//! unvisited function `fg` is matched against every known canonical `g`: if
//! `fg` can be written as `f | g` (up to negating `f`, `g` and the output),
//! the bits of `f` are pinned except where `g` is set, and those free bits
//! are enumerated until some `f` of exactly the remaining size turns up.

use std::ops::AddAssign;

use rayon::prelude::*;

use crate::canon::Canonicalizer;
use crate::enumerate::Discovery;
use crate::error::InvariantViolation;
use crate::func::Func;
use crate::index::VisitedSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Unvisited functions examined.
    pub candidates: u64,
    /// `(fg, g, variant)` combinations that passed the containment check.
    pub combinations: u64,
    /// Assignments of free bits looked up in the size index.
    pub probes: u64,
}

impl AddAssign for SearchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.candidates += rhs.candidates;
        self.combinations += rhs.combinations;
        self.probes += rhs.probes;
    }
}

/// Outcome of searching one unvisited function.
struct Candidate {
    fg: Func,
    /// Operands `(p, q)` building `fg` at the level being searched.
    found: Option<(Func, Func)>,
    stats: SearchStats,
}

/// Read-only view used while a batch is searched in parallel.
///
/// Visits made while the level is built only add entries of the level's
/// own size, which `find` never looks for, so a batch can be searched
/// against a snapshot and applied afterwards.
struct Searcher<'a> {
    state: &'a Discovery,
    by_size: &'a [Vec<Func>],
    xor: bool,
}

impl Searcher<'_> {
    const fn level(&self) -> usize {
        self.by_size.len()
    }

    /// Finds operands `(p, q)` with `fg = p op q` and
    /// `size(p) + size(q) + 1 == level`.
    fn witness(&self, fg: Func, stats: &mut SearchStats) -> Option<(Func, Func)> {
        let u = self.state.universe;
        let fg1 = u.complement(fg);
        stats.candidates += 1;

        for (size, bucket) in self.by_size.iter().enumerate() {
            let target = (self.level() - size - 1) as u8;
            for &g in bucket {
                let g1 = u.complement(g);

                // fg = f | g
                if fg | g == fg {
                    stats.combinations += 1;
                    if let Some(f) = self.find(fg & g1, g, target, stats) {
                        return Some((f, g));
                    }
                }
                // fg = f | !g
                if fg | g1 == fg {
                    stats.combinations += 1;
                    if let Some(f) = self.find(fg & g, g1, target, stats) {
                        return Some((f, g1));
                    }
                }
                // fg = !f & !g
                if fg1 | g == fg1 {
                    stats.combinations += 1;
                    if let Some(f) = self.find(fg1 & g1, g, target, stats) {
                        return Some((u.complement(f), g1));
                    }
                }
                // fg = !f & g
                if fg1 | g1 == fg1 {
                    stats.combinations += 1;
                    if let Some(f) = self.find(fg1 & g, g1, target, stats) {
                        return Some((u.complement(f), g));
                    }
                }
                if self.xor {
                    stats.combinations += 1;
                    if let Some(f) = self.find(fg ^ g, Func(0), target, stats) {
                        return Some((f, g));
                    }
                }
            }
        }
        None
    }

    /// Looks for a known function of size `target` among `x | s` for every
    /// subset `s` of `can_set`.
    ///
    /// Subsets are generated by adding bits of `can_set` lowest first, so
    /// each one is probed exactly once.
    fn find(&self, x: Func, can_set: Func, target: u8, stats: &mut SearchStats) -> Option<Func> {
        stats.probes += 1;
        let x1 = self.state.universe.fold_output(x).0;
        if self.state.visited.contains(x1) && self.state.sizes.get(x1) == Some(target) {
            return Some(x);
        }
        let mut rest = can_set.0;
        while rest != 0 {
            let bit = rest & rest.wrapping_neg();
            rest ^= bit;
            if let Some(f) = self.find(Func(x.0 | bit), Func(rest), target, stats) {
                return Some(f);
            }
        }
        None
    }
}

/// Collects up to `limit` unvisited values starting at `*cursor`, advancing
/// it past the last value examined.
fn next_unvisited(visited: &VisitedSet, cursor: &mut u64, limit: usize) -> Vec<Func> {
    let mut out = Vec::with_capacity(limit);
    while *cursor < visited.len() && out.len() < limit {
        if cursor.is_multiple_of(64) && visited.word((*cursor / 64) as usize) == u64::MAX {
            *cursor += 64;
            continue;
        }
        let f = Func(*cursor as u32);
        if !visited.contains(f) {
            out.push(f);
        }
        *cursor += 1;
    }
    out
}

/// Builds level `by_size.len()` by searching for every unvisited function.
///
/// Values are scanned in ascending order in batches of `batch`; each batch
/// is searched in parallel and then recorded in order.
pub(crate) fn targeted_level(
    canon: &Canonicalizer,
    state: &mut Discovery,
    by_size: &[Vec<Func>],
    xor: bool,
    batch: usize,
) -> Result<SearchStats, InvariantViolation> {
    let level = by_size.len() as u8;
    let mut total = SearchStats::default();
    let mut cursor = 0u64;
    loop {
        let pending = next_unvisited(&state.visited, &mut cursor, batch.max(1));
        if pending.is_empty() {
            break;
        }

        let searcher = Searcher {
            state: &*state,
            by_size,
            xor,
        };
        let results: Vec<Candidate> = pending
            .par_iter()
            .map(|&fg| {
                let mut stats = SearchStats::default();
                let found = searcher.witness(fg, &mut stats);
                Candidate { fg, found, stats }
            })
            .collect();

        for Candidate { fg, found, stats } in results {
            total += stats;
            if let Some((p, q)) = found {
                state.visit(canon, fg, p, q, level)?;
            }
        }
    }
    log::debug!(
        "level {level}: searched {} candidates, {} new",
        total.candidates,
        state.queue.len()
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::Universe;

    #[test]
    fn scan_skips_visited_values() {
        let u = Universe::new(4).expect("four variables");
        let mut v = VisitedSet::new(&u);
        for f in 0..64 {
            v.insert(Func(f));
        }
        v.insert(Func(66));
        let mut cursor = 0;
        assert_eq!(
            next_unvisited(&v, &mut cursor, 3),
            vec![Func(64), Func(65), Func(67)]
        );
        assert_eq!(cursor, 68);
        assert_eq!(next_unvisited(&v, &mut cursor, 1), vec![Func(68)]);
    }

    #[test]
    fn scan_stops_at_the_half() {
        let u = Universe::new(2).expect("two variables");
        let v = VisitedSet::new(&u);
        let mut cursor = 0;
        assert_eq!(next_unvisited(&v, &mut cursor, 100).len(), 8);
        assert!(next_unvisited(&v, &mut cursor, 100).is_empty());
    }
}
