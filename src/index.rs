//! Packed per-function tables over the top-bit-clear half of the universe.
//!
//! Every function can be complemented into that half without changing its
//! NPN class, so one entry covers a function and its complement.

use crate::func::{Func, Universe};

/// Membership bitset: a function is visited once its class has been found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitedSet {
    words: Vec<u64>,
    len: u64,
    count: u64,
}

impl VisitedSet {
    pub fn new(universe: &Universe) -> Self {
        let len = universe.half();
        Self {
            words: vec![0; len.div_ceil(64) as usize],
            len,
            count: 0,
        }
    }

    #[inline]
    pub fn contains(&self, f: Func) -> bool {
        debug_assert!(u64::from(f.0) < self.len);
        self.words[(f.0 >> 6) as usize] & (1 << (f.0 & 63)) != 0
    }

    /// Marks `f`. Returns `false` if it was already marked.
    #[inline]
    pub fn insert(&mut self, f: Func) -> bool {
        debug_assert!(u64::from(f.0) < self.len);
        let word = &mut self.words[(f.0 >> 6) as usize];
        let bit = 1 << (f.0 & 63);
        if *word & bit != 0 {
            return false;
        }
        *word |= bit;
        self.count += 2;
        true
    }

    /// Number of visited functions, complements included.
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Number of values covered by the bitset.
    pub const fn len(&self) -> u64 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn word_count(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn word(&self, i: usize) -> u64 {
        self.words[i]
    }
}

/// Minimal known size per function, five bits per entry, twelve entries per
/// word (the top four bits of each word are unused).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeIndex {
    words: Vec<u64>,
}

impl SizeIndex {
    /// Entry value meaning "no size recorded yet".
    pub const UNKNOWN: u8 = 0x1F;

    /// Largest size an entry can hold.
    pub const MAX_SIZE: usize = Self::UNKNOWN as usize - 1;

    const PER_WORD: u64 = 12;

    pub fn new(universe: &Universe) -> Self {
        Self {
            words: vec![!0; universe.half().div_ceil(Self::PER_WORD) as usize],
        }
    }

    #[inline]
    fn slot(f: Func) -> (usize, u32) {
        let f = u64::from(f.0);
        (
            (f / Self::PER_WORD) as usize,
            (5 * (f % Self::PER_WORD)) as u32,
        )
    }

    #[inline]
    pub fn get(&self, f: Func) -> Option<u8> {
        let (i, shift) = Self::slot(f);
        match ((self.words[i] >> shift) & 0x1F) as u8 {
            Self::UNKNOWN => None,
            size => Some(size),
        }
    }

    #[inline]
    pub fn set(&mut self, f: Func, size: u8) {
        debug_assert!(usize::from(size) <= Self::MAX_SIZE);
        let (i, shift) = Self::slot(f);
        let word = &mut self.words[i];
        *word = (*word & !(0x1F << shift)) | (u64::from(size & 0x1F) << shift);
    }
}
