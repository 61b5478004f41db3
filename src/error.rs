use thiserror::Error;

use crate::quotient_filter::{MAX_MEMORY_BYTES, MAX_Q, MAX_R, MIN_Q, MIN_R};

/// Rejected construction parameters. Only ever produced before any plane is allocated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("quotient bits {0} outside {}..={}", MIN_Q, MAX_Q)]
    QuotientBits(u8),

    #[error("remainder bits {0} outside {}..={}", MIN_R, MAX_R)]
    RemainderBits(u8),

    #[error("filter needs {needed} bytes, limit is {}", MAX_MEMORY_BYTES)]
    MemoryLimit { needed: u64 },

    #[error("plane of {bits} bits is not addressable on this platform")]
    Unaddressable { bits: u64 },

    #[error("expected items must be greater than 0")]
    NoExpectedItems,

    #[error("false positive rate {0} outside (0, 1)")]
    FalsePositiveRate(f64),

    #[error("no quotient/remainder split reaches p={fp_rate} for {items} items")]
    Unachievable { items: u64, fp_rate: f64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("invariant violation at slot {slot}: {detail}")]
    InvariantViolation { slot: u64, detail: &'static str },

    #[error("filter is full ({slots} slots)")]
    CapacityExceeded { slots: u64 },

    #[error("incompatible filters: q={q}/r={r} vs q={other_q}/r={other_r}")]
    IncompatibleFilters {
        q: u8,
        r: u8,
        other_q: u8,
        other_r: u8,
    },

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt filter encoding: {0}")]
    Corrupt(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
