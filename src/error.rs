use std::fmt;

use crate::checkpoint::CheckpointError;
use crate::func::{Func, Record};
use crate::query::QueryError;

/// A broken internal invariant.
///
/// These indicate a defect in canonicalization or bookkeeping rather than a
/// runtime condition. A run that hits one must stop: continuing would write a
/// corrupt table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A negation sweep did not bring the working value back to its start.
    NegationCycleOpen { start: Func, end: Func },
    /// A permutation sweep did not bring the working value back to its start.
    PermutationCycleOpen { start: Func, end: Func },
    /// A precomputed transform sequence is not a closed cycle.
    TransformTable(String),
    /// Seeding level 0 marked an unexpected number of functions.
    SeedCount { expected: u64, got: u64 },
    /// Replaying a checkpoint produced a different bucket than the one stored.
    ReplayMismatch { level: usize },
    /// A checkpoint record is not a valid construction at its level.
    CorruptRecord { level: usize, record: Record },
    /// No remaining function can be reached from the known levels.
    SearchExhausted { level: usize, remaining: u64 },
    /// Re-decoding a converted table did not reproduce the checkpoint.
    ConversionMismatch,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegationCycleOpen { start, end } => {
                write!(f, "negation cycle did not close: {start} -> {end}")
            }
            Self::PermutationCycleOpen { start, end } => {
                write!(f, "permutation cycle did not close: {start} -> {end}")
            }
            Self::TransformTable(msg) => write!(f, "bad transform table: {msg}"),
            Self::SeedCount { expected, got } => {
                write!(f, "wrong visit count after literal: expected {expected}, got {got}")
            }
            Self::ReplayMismatch { level } => {
                write!(f, "replayed level {level} differs from the checkpoint")
            }
            Self::CorruptRecord { level, record } => write!(
                f,
                "checkpoint record ({}, {}, {}) is not a level {level} construction",
                record.f, record.p, record.q
            ),
            Self::SearchExhausted { level, remaining } => write!(
                f,
                "search exhausted at level {level} with {remaining} functions unvisited"
            ),
            Self::ConversionMismatch => write!(f, "converted table does not match its source"),
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Rejected run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    VarCount(usize),
    Level(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VarCount(n) => write!(f, "unsupported variable count {n} (expected 2..=5)"),
            Self::Level(n) => write!(f, "level {n} does not fit the 5-bit size index"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Any failure a library entry point can report.
#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Invariant(InvariantViolation),
    Checkpoint(CheckpointError),
    Query(QueryError),
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<InvariantViolation> for Error {
    fn from(e: InvariantViolation) -> Self {
        Self::Invariant(e)
    }
}

impl From<CheckpointError> for Error {
    fn from(e: CheckpointError) -> Self {
        Self::Checkpoint(e)
    }
}

impl From<QueryError> for Error {
    fn from(e: QueryError) -> Self {
        Self::Query(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Checkpoint(CheckpointError::Io(e))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::Invariant(e) => write!(f, "invariant violated: {e}"),
            Self::Checkpoint(e) => e.fmt(f),
            Self::Query(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Invariant(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
            Self::Query(e) => Some(e),
        }
    }
}
