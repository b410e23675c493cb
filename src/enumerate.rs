//! Breadth-first discovery of minimal circuit sizes, one level at a time.
//!
//! Level `k` holds the canonical functions whose smallest AND/OR(/XOR)
//! circuit uses exactly `k` gates. Up to the cutoff a level is found by
//! combining every pair of lower levels whose sizes add to `k - 1`; past it,
//! the missing functions are looked up directly (see [`crate::search`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use itertools::Itertools;

use crate::cache::ExploredCache;
use crate::canon::{Canonicalizer, OrbitWalk};
use crate::checkpoint::{CheckpointStore, Savepoint, SavepointRef};
use crate::error::{ConfigError, Error, InvariantViolation};
use crate::func::{Func, Record, Universe};
use crate::index::{SizeIndex, VisitedSet};
use crate::search::{self, SearchStats};

/// Highest level the size index can represent.
pub const MAX_LEVEL: usize = SizeIndex::MAX_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateOptions {
    /// Number of input variables.
    pub vars: usize,
    /// Allow XOR gates.
    pub xor: bool,
    /// Last level built from pairs; later levels use the targeted search.
    pub cutoff: usize,
    /// Replay a checkpoint only up to (not including) this level.
    pub redo: Option<usize>,
    /// Unvisited functions handed to the parallel search at once.
    pub search_batch: usize,
    /// Give up instead of building levels above this one.
    pub max_level: usize,
}

impl Default for EnumerateOptions {
    fn default() -> Self {
        Self {
            vars: 4,
            xor: false,
            cutoff: MAX_LEVEL,
            redo: None,
            search_batch: 4096,
            max_level: MAX_LEVEL,
        }
    }
}

/// Summary of one finished level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelStats {
    pub level: usize,
    pub found: usize,
    pub visited: u64,
    pub records: usize,
    pub elapsed: Duration,
    /// Present when the level came from the targeted search.
    pub search: Option<SearchStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every function has a known size.
    Complete,
    /// The stop flag was raised; the last finished level is checkpointed.
    Stopped { next_level: usize },
}

/// Mutable discovery state shared by both level strategies.
#[derive(Debug, Clone)]
pub(crate) struct Discovery {
    pub(crate) universe: Universe,
    pub(crate) visited: VisitedSet,
    pub(crate) sizes: SizeIndex,
    pub(crate) howto: Vec<Record>,
    /// Canonical functions found in the level being built.
    pub(crate) queue: Vec<Func>,
}

impl Discovery {
    fn new(universe: Universe) -> Self {
        Self {
            universe,
            visited: VisitedSet::new(&universe),
            sizes: SizeIndex::new(&universe),
            howto: Vec::new(),
            queue: Vec::new(),
        }
    }

    /// Records `f = p op q` at `size` unless `f`'s class is already known.
    ///
    /// Marks the whole orbit of `f` and appends the canonical record.
    /// Returns whether the class was new.
    pub(crate) fn visit(
        &mut self,
        canon: &Canonicalizer,
        f: Func,
        p: Func,
        q: Func,
        size: u8,
    ) -> Result<bool, InvariantViolation> {
        let (f0, mask) = self.universe.fold_output(f);
        if self.visited.contains(f0) {
            return Ok(false);
        }
        let mut mark = MarkOrbit {
            universe: &self.universe,
            visited: &mut self.visited,
            sizes: &mut self.sizes,
            size,
            best: [f0, Func(p.0 ^ mask), Func(q.0 ^ mask)],
        };
        canon.walk([f, p, q], &mut mark)?;
        let [f, p, q] = mark.best;
        self.howto.push(Record::new(f, p, q));
        self.queue.push(f);
        Ok(true)
    }

    /// Like [`Self::visit`] for an input literal, which has no operands.
    fn visit_literal(&mut self, canon: &Canonicalizer, f: Func) -> Result<bool, InvariantViolation> {
        let (f0, _) = self.universe.fold_output(f);
        if self.visited.contains(f0) {
            return Ok(false);
        }
        let mut mark = MarkOrbit {
            universe: &self.universe,
            visited: &mut self.visited,
            sizes: &mut self.sizes,
            size: 0,
            best: [f0],
        };
        canon.walk([f], &mut mark)?;
        let [f] = mark.best;
        self.howto.push(Record::new(f, f, Func(0)));
        self.queue.push(f);
        Ok(true)
    }
}

/// Marks every orbit member while tracking the minimum and its witnesses.
struct MarkOrbit<'a, const N: usize> {
    universe: &'a Universe,
    visited: &'a mut VisitedSet,
    sizes: &'a mut SizeIndex,
    size: u8,
    best: [Func; N],
}

impl<const N: usize> OrbitWalk<N> for MarkOrbit<'_, N> {
    // A negation landing on a marked value repeats an earlier sweep.
    fn enter(&mut self, vals: &[Func; N]) -> bool {
        !self.visited.contains(self.universe.fold_output(vals[0]).0)
    }

    fn member(&mut self, vals: &mut [Func; N]) {
        let (fc, mask) = self.universe.fold_output(vals[0]);
        if fc < self.best[0] {
            for (b, v) in self.best.iter_mut().zip(vals.iter()) {
                *b = Func(v.0 ^ mask);
            }
        }
        if self.visited.insert(fc) {
            self.sizes.set(fc, self.size);
        }
    }
}

/// Combines every member of `f`'s orbit with each of `gs`.
struct Explorer<'a> {
    canon: &'a Canonicalizer,
    state: &'a mut Discovery,
    explored: &'a mut ExploredCache,
    gs: &'a [Func],
    size: u8,
    xor: bool,
    failed: Option<InvariantViolation>,
}

impl Explorer<'_> {
    fn pair(&mut self, f: Func) -> Result<(), InvariantViolation> {
        let u = self.state.universe;
        let nf = u.complement(f);
        for &g in self.gs {
            let ng = u.complement(g);

            let fg = f & g;
            if fg != f && fg != g {
                self.state.visit(self.canon, fg, f, g, self.size)?;
            }
            let fg = f | g;
            if fg != f && fg != g {
                self.state.visit(self.canon, fg, f, g, self.size)?;
            }
            let fg = f & ng;
            if fg != f {
                self.state.visit(self.canon, fg, f, ng, self.size)?;
            }
            let fg = nf & g;
            if fg != g {
                self.state.visit(self.canon, fg, nf, g, self.size)?;
            }
            if self.xor {
                let fg = f ^ g;
                if fg != f && fg != g {
                    self.state.visit(self.canon, fg, f, g, self.size)?;
                }
            }
        }
        Ok(())
    }
}

impl OrbitWalk<1> for Explorer<'_> {
    fn enter(&mut self, vals: &[Func; 1]) -> bool {
        let fc = self.state.universe.fold_output(vals[0]).0;
        self.failed.is_none() && !self.explored.contains(fc)
    }

    fn member(&mut self, vals: &mut [Func; 1]) {
        if self.failed.is_some() {
            return;
        }
        let fc = self.state.universe.fold_output(vals[0]).0;
        if !self.explored.insert(fc) {
            return;
        }
        if let Err(e) = self.pair(fc) {
            self.failed = Some(e);
        }
    }
}

/// Drives a whole enumeration run.
#[derive(Debug, Clone)]
pub struct Enumerator {
    options: EnumerateOptions,
    canon: Canonicalizer,
    state: Discovery,
    explored: ExploredCache,
    by_size: Vec<Vec<Func>>,
}

impl Enumerator {
    pub fn new(options: EnumerateOptions) -> Result<Self, Error> {
        if options.max_level > MAX_LEVEL {
            return Err(ConfigError::Level(options.max_level).into());
        }
        let universe = Universe::new(options.vars)?;
        let canon = Canonicalizer::new(universe)?;
        Ok(Self {
            options,
            canon,
            state: Discovery::new(universe),
            explored: ExploredCache::new(),
            by_size: Vec::new(),
        })
    }

    pub const fn options(&self) -> &EnumerateOptions {
        &self.options
    }

    pub const fn universe(&self) -> &Universe {
        self.canon.universe()
    }

    pub const fn canonicalizer(&self) -> &Canonicalizer {
        &self.canon
    }

    /// Index of the level [`Self::run_level`] builds next.
    pub const fn next_level(&self) -> usize {
        self.by_size.len()
    }

    pub fn levels(&self) -> &[Vec<Func>] {
        &self.by_size
    }

    pub fn records(&self) -> &[Record] {
        &self.state.howto
    }

    /// Number of functions with a known size, complements included.
    pub const fn visited_count(&self) -> u64 {
        self.state.visited.count()
    }

    pub const fn is_complete(&self) -> bool {
        self.visited_count() == self.universe().func_count()
    }

    /// Minimal size found so far for any function, canonical or not.
    pub fn size_of(&self, f: Func) -> Option<u8> {
        let fc = self.universe().fold_output(f).0;
        if self.state.visited.contains(fc) {
            self.state.sizes.get(fc)
        } else {
            None
        }
    }

    pub fn savepoint(&self) -> Savepoint {
        Savepoint {
            howto: self.state.howto.clone(),
            by_size: self.by_size.clone(),
        }
    }

    pub fn savepoint_ref(&self) -> SavepointRef<'_> {
        SavepointRef {
            howto: &self.state.howto,
            by_size: &self.by_size,
        }
    }

    /// Builds level 0: the single class of input literals.
    pub fn seed(&mut self) -> Result<(), InvariantViolation> {
        self.reset();
        let u = *self.universe();
        self.state.visit_literal(&self.canon, u.complement(u.literal(0)))?;
        self.check_seed()?;
        let bucket = std::mem::take(&mut self.state.queue);
        self.by_size.push(bucket);
        Ok(())
    }

    /// Rebuilds the state of `sp` by replaying its records.
    ///
    /// Levels from `options.redo` on are dropped so they get rebuilt. Every
    /// record is checked before it is replayed: its values must fit the
    /// universe and its operands must be known functions whose sizes add up
    /// to one less than its level and that combine into it. Returns the next
    /// level to build.
    pub fn resume(&mut self, sp: &Savepoint) -> Result<usize, InvariantViolation> {
        self.reset();
        let keep = self
            .options
            .redo
            .map_or(sp.by_size.len(), |redo| redo.min(sp.by_size.len()));
        if keep > self.options.max_level + 1 {
            return Err(InvariantViolation::ReplayMismatch {
                level: self.options.max_level + 1,
            });
        }

        let mut records = sp.howto.iter();
        for (level, stored) in sp.by_size[..keep].iter().enumerate() {
            for r in records.by_ref().take(stored.len()) {
                self.check_record(level, r)?;
                if level == 0 {
                    self.state.visit_literal(&self.canon, r.f)?;
                } else {
                    self.state.visit(&self.canon, r.f, r.p, r.q, level as u8)?;
                }
            }
            let bucket = std::mem::take(&mut self.state.queue);
            if bucket != *stored {
                return Err(InvariantViolation::ReplayMismatch { level });
            }
            self.by_size.push(bucket);
            if level == 0 {
                self.check_seed()?;
            }
        }
        log::info!(
            "replayed {} levels, {} records, {} visited",
            self.by_size.len(),
            self.state.howto.len(),
            self.visited_count()
        );
        Ok(self.next_level())
    }

    /// The literal class holds every input and its complement.
    fn check_seed(&self) -> Result<(), InvariantViolation> {
        let expected = 2 * self.universe().vars() as u64;
        if self.visited_count() != expected {
            return Err(InvariantViolation::SeedCount {
                expected,
                got: self.visited_count(),
            });
        }
        Ok(())
    }

    fn check_record(&self, level: usize, r: &Record) -> Result<(), InvariantViolation> {
        let u = self.universe();
        let corrupt = || InvariantViolation::CorruptRecord { level, record: *r };
        if ![r.f, r.p, r.q].into_iter().all(|v| u.contains(v)) || !u.top_clear(r.f) {
            return Err(corrupt());
        }
        if level == 0 {
            return if r.is_literal() && r.q == Func(0) {
                Ok(())
            } else {
                Err(corrupt())
            };
        }
        match self.size_of(r.p).zip(self.size_of(r.q)) {
            Some((a, b))
                if usize::from(a) + usize::from(b) + 1 == level
                    && r.combines(u, self.options.xor) =>
            {
                Ok(())
            }
            _ => Err(corrupt()),
        }
    }

    /// Resumes from the newest checkpoint in `store` that replays cleanly,
    /// falling back to older levels past files that do not.
    ///
    /// Returns the next level to build, or `None` with the state cleared
    /// when no checkpoint is usable.
    pub fn restore(&mut self, store: &CheckpointStore) -> Option<usize> {
        for (level, sp) in store.newest_first(self.options.max_level) {
            match self.resume(&sp) {
                Ok(next) => {
                    log::info!("resumed from {}", store.path(level).display());
                    return Some(next);
                }
                Err(e) => log::warn!("skipping {}: {e}", store.path(level).display()),
            }
        }
        self.reset();
        None
    }

    /// Builds the next level.
    pub fn run_level(&mut self) -> Result<LevelStats, InvariantViolation> {
        let level = self.next_level();
        if level == 0 {
            let start = Instant::now();
            self.seed()?;
            return Ok(LevelStats {
                level,
                found: 1,
                visited: self.visited_count(),
                records: self.state.howto.len(),
                elapsed: start.elapsed(),
                search: None,
            });
        }
        self.check_reachable(level)?;
        let start = Instant::now();
        self.state.queue.clear();

        let search = if level <= self.options.cutoff {
            self.pair_level(level)?;
            None
        } else {
            Some(search::targeted_level(
                &self.canon,
                &mut self.state,
                &self.by_size,
                self.options.xor,
                self.options.search_batch,
            )?)
        };

        let bucket = std::mem::take(&mut self.state.queue);
        let stats = LevelStats {
            level,
            found: bucket.len(),
            visited: self.visited_count(),
            records: self.state.howto.len(),
            elapsed: start.elapsed(),
            search,
        };
        self.by_size.push(bucket);
        Ok(stats)
    }

    /// Builds levels until every function is covered or `stop` is raised,
    /// saving a checkpoint after each level.
    ///
    /// A failed checkpoint write is logged and the run continues; the next
    /// level's write tries again.
    pub fn run(
        &mut self,
        store: Option<&CheckpointStore>,
        stop: &AtomicBool,
    ) -> Result<Outcome, InvariantViolation> {
        if self.by_size.is_empty() {
            self.seed()?;
        }
        let start = Instant::now();
        while !self.is_complete() {
            if stop.load(Ordering::Relaxed) {
                log::info!("stopping before level {}", self.next_level());
                return Ok(Outcome::Stopped {
                    next_level: self.next_level(),
                });
            }
            let stats = self.run_level()?;
            log::info!(
                "level {}: {} new, {} visited, {} records, {:.1}s",
                stats.level,
                stats.found,
                stats.visited,
                stats.records,
                start.elapsed().as_secs_f64()
            );
            if let Some(s) = &stats.search {
                log::info!(
                    "level {} search: {} candidates, {} combinations, {} probes",
                    stats.level,
                    s.candidates,
                    s.combinations,
                    s.probes
                );
            }
            log::debug!(
                "level sizes: {}",
                self.by_size.iter().map(Vec::len).join(" ")
            );
            if let Some(store) = store {
                if let Err(e) = store.save(self.savepoint_ref(), stats.level) {
                    log::warn!("checkpoint for level {} not written: {e}", stats.level);
                }
            }
        }
        log::info!(
            "complete: {} classes in {} levels",
            self.state.howto.len(),
            self.by_size.len()
        );
        Ok(Outcome::Complete)
    }

    fn reset(&mut self) {
        self.state = Discovery::new(*self.universe());
        self.by_size.clear();
    }

    /// A new function at `level` needs two operands of total size
    /// `level - 1`, so once `level` passes twice the highest non-empty level
    /// plus one nothing more can be found.
    fn check_reachable(&self, level: usize) -> Result<(), InvariantViolation> {
        let highest = self.by_size.iter().rposition(|b| !b.is_empty()).unwrap_or(0);
        if level > 2 * highest + 1 || level > self.options.max_level {
            return Err(InvariantViolation::SearchExhausted {
                level,
                remaining: self.universe().func_count() - self.visited_count(),
            });
        }
        Ok(())
    }

    fn pair_level(&mut self, level: usize) -> Result<(), InvariantViolation> {
        self.explored.reset();
        let canon = &self.canon;
        let state = &mut self.state;
        let explored = &mut self.explored;
        let by_size = &self.by_size;
        let xor = self.options.xor;
        let size = level as u8;
        let mut explore = |f: Func, gs: &[Func]| -> Result<(), InvariantViolation> {
            let mut explorer = Explorer {
                canon,
                state: &mut *state,
                explored: &mut *explored,
                gs,
                size,
                xor,
                failed: None,
            };
            canon.walk([f], &mut explorer)?;
            explorer.failed.map_or(Ok(()), Err)
        };

        for i in (0..level).take_while(|i| 2 * i + 1 < level) {
            let gs: &[Func] = &by_size[level - 1 - i];
            for &f in &by_size[i] {
                explore(f, gs)?;
            }
        }
        if level % 2 == 1 {
            let gs: &[Func] = &by_size[level / 2];
            for (j, &f) in gs.iter().enumerate() {
                explore(f, &gs[..=j])?;
            }
        }
        Ok(())
    }
}
