//! Minimal AND/OR/XOR circuit sizes for every Boolean function of up to five
//! variables, enumerated one NPN class at a time.

pub use error::{ConfigError, Error, InvariantViolation};
pub use func::{Func, Record, Universe};

pub mod cache;
pub mod canon;
pub mod checkpoint;
pub mod enumerate;
pub mod func;
pub mod index;
pub mod query;
pub mod raw;
pub mod search;
pub mod transform;

mod error;
