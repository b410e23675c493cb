use crate::func::Func;

/// Best-effort record of functions already explored during one level.
///
/// Each function hashes to a single slot (`f % len`) that remembers the last
/// function stored there. A hit is exact: if the slot holds `f`, `f` was
/// explored. A miss may be wrong when two functions share a slot, which only
/// costs repeated work; deduplication of results goes through the visited
/// bitset, never through this cache.
#[derive(Debug, Clone)]
pub struct ExploredCache {
    slots: Vec<Func>,
}

impl ExploredCache {
    pub const DEFAULT_SLOTS: usize = 100_003;

    pub fn new() -> Self {
        Self::with_slots(Self::DEFAULT_SLOTS)
    }

    pub fn with_slots(len: usize) -> Self {
        let mut cache = Self {
            slots: vec![Func(0); len.max(2)],
        };
        cache.reset();
        cache
    }

    /// Forgets everything. Slot `i` is filled with `i + 1`, which can never
    /// hash to slot `i`.
    pub fn reset(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = Func(i as u32 + 1);
        }
    }

    #[inline]
    const fn slot(&self, f: Func) -> usize {
        (f.0 as usize) % self.slots.len()
    }

    #[inline]
    pub fn contains(&self, f: Func) -> bool {
        self.slots[self.slot(f)] == f
    }

    /// Records `f`. Returns `false` if it was already recorded.
    #[inline]
    pub fn insert(&mut self, f: Func) -> bool {
        let i = self.slot(f);
        if self.slots[i] == f {
            return false;
        }
        self.slots[i] = f;
        true
    }
}

impl Default for ExploredCache {
    fn default() -> Self {
        Self::new()
    }
}
