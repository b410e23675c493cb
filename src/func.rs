use std::{
    fmt::{self, Display},
    ops::{BitAnd, BitOr, BitXor},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
/// Truth table of a Boolean function.
///
/// Bit `k` holds the output on input assignment `k`, where variable `i` is
/// bit `i` of `k`. Only the low [`Universe::inputs`] bits are meaningful;
/// the value says nothing about how the function is computed.
pub struct Func(pub u32);

impl BitAnd for Func {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for Func {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitXor for Func {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl FromStr for Func {
    type Err = anyhow::Error;

    /// Accepts `0x`/`0b`/`0o` prefixed or plain decimal values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, radix) = match s.get(..2) {
            Some("0x" | "0X") => (&s[2..], 16),
            Some("0b" | "0B") => (&s[2..], 2),
            Some("0o" | "0O") => (&s[2..], 8),
            _ => (s, 10),
        };
        u32::from_str_radix(&digits.replace('_', ""), radix)
            .map(Func)
            .map_err(|e| anyhow::anyhow!("cannot parse {s} as a function value: {e}"))
    }
}

/// A construction record: `f` was first built by combining `p` and `q`.
///
/// The operator is not stored; it is recovered by checking which of `&`, `|`
/// or `^` (up to output complement) reproduces `f`. Literals are stored with
/// `p == f`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub f: Func,
    pub p: Func,
    pub q: Func,
}

impl Record {
    pub const fn new(f: Func, p: Func, q: Func) -> Self {
        Self { f, p, q }
    }

    pub fn is_literal(&self) -> bool {
        self.f == self.p
    }

    /// Whether `f` is `p | q`, `p & q` or, with `xor`, `p ^ q` up to output
    /// complement.
    pub fn combines(&self, universe: &Universe, xor: bool) -> bool {
        let Self { f, p, q } = *self;
        f == (p | q)
            || f == (p & q)
            || (xor && (f == (p ^ q) || f == universe.complement(p ^ q)))
    }
}

/// The space of all functions of a fixed number of variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Universe {
    vars: usize,
    inputs: u32,
    all: u32,
}

impl Universe {
    pub const MIN_VARS: usize = 2;
    pub const MAX_VARS: usize = 5;

    pub fn new(vars: usize) -> Result<Self, ConfigError> {
        if !(Self::MIN_VARS..=Self::MAX_VARS).contains(&vars) {
            return Err(ConfigError::VarCount(vars));
        }
        let inputs = 1u32 << vars;
        let all = if inputs == 32 {
            u32::MAX
        } else {
            (1u32 << inputs) - 1
        };
        Ok(Self { vars, inputs, all })
    }

    pub const fn vars(&self) -> usize {
        self.vars
    }

    /// Number of input assignments, `2^vars`.
    pub const fn inputs(&self) -> u32 {
        self.inputs
    }

    /// Number of functions, `2^inputs`.
    pub const fn func_count(&self) -> u64 {
        1u64 << self.inputs
    }

    /// Number of functions whose top truth-table bit is clear.
    pub const fn half(&self) -> u64 {
        self.func_count() / 2
    }

    /// The constant-true function.
    pub const fn all(&self) -> Func {
        Func(self.all)
    }

    pub const fn complement(&self, f: Func) -> Func {
        Func(f.0 ^ self.all)
    }

    /// Whether `f` has no bits above the truth table.
    pub const fn contains(&self, f: Func) -> bool {
        f.0 & !self.all == 0
    }

    /// Returns the function equal to input variable `i` on every assignment.
    pub fn literal(&self, i: usize) -> Func {
        debug_assert!(i < self.vars);
        self.tabulate(|x| x[i])
    }

    /// Complements `f` if its top truth-table bit is set.
    ///
    /// Returns the folded value together with the mask that was applied, so
    /// witnesses can be folded the same way. The folded value always has the
    /// top bit clear.
    #[inline]
    pub const fn fold_output(&self, f: Func) -> (Func, u32) {
        let top = (f.0 >> (self.inputs - 1)) & 1;
        let mask = top.wrapping_neg() & self.all;
        (Func(f.0 ^ mask), mask)
    }

    #[inline]
    pub const fn top_clear(&self, f: Func) -> bool {
        (f.0 >> (self.inputs - 1)) & 1 == 0
    }

    /// Evaluates `pred` on every input assignment.
    ///
    /// The slice handed to `pred` holds the value of each variable, variable
    /// 0 first.
    pub fn tabulate<P>(&self, pred: P) -> Func
    where
        P: Fn(&[bool]) -> bool,
    {
        let mut assignment = vec![false; self.vars];
        let mut out = 0u32;
        for k in 0..self.inputs {
            for (i, v) in assignment.iter_mut().enumerate() {
                *v = (k >> i) & 1 == 1;
            }
            if pred(&assignment) {
                out |= 1 << k;
            }
        }
        Func(out)
    }
}
