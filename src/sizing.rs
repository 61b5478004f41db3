//! Closed-form planning arithmetic.
//!
//! With `m = 2^q` slots and `r` remainder bits, the probability that a lookup for an absent key
//! collides with one of `n` stored fingerprints is `1 - e^(-n / (m * 2^r))`.

use crate::error::ConfigurationError;
use crate::quotient_filter::{MAX_Q, MAX_R, MIN_Q, MIN_R};

/// Highest load factor [`FilterParams::for_accuracy`] plans for. Cluster lengths grow quickly
/// past this point.
pub const MAX_PLANNED_LOAD: f64 = 0.75;

pub fn false_positive_rate(q: u8, r: u8, n: u64) -> f64 {
    let denom = (1u64 << q) as f64 * (r as f64).exp2();
    -(-(n as f64) / denom).exp_m1()
}

/// Number of items after which the estimated false positive rate reaches `fp_rate`, never
/// more than the slot count.
pub fn capacity(q: u8, r: u8, fp_rate: f64) -> u64 {
    let slots = 1u64 << q;
    if fp_rate <= 0.0 {
        return 0;
    }
    if fp_rate >= 1.0 {
        return slots;
    }
    let n = -(-fp_rate).ln_1p() * slots as f64 * (r as f64).exp2();
    if n >= slots as f64 {
        slots
    } else {
        n.floor() as u64
    }
}

/// A `(q, r)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterParams {
    pub quotient_bits: u8,
    pub remainder_bits: u8,
}

impl FilterParams {
    /// Smallest filter holding `items` at no more than [`MAX_PLANNED_LOAD`] whose estimated
    /// false positive rate at `items` is at most `fp_rate`.
    pub fn for_accuracy(items: u64, fp_rate: f64) -> Result<Self, ConfigurationError> {
        if items == 0 {
            return Err(ConfigurationError::NoExpectedItems);
        }
        if !(fp_rate > 0.0 && fp_rate < 1.0) {
            return Err(ConfigurationError::FalsePositiveRate(fp_rate));
        }
        let unachievable = ConfigurationError::Unachievable { items, fp_rate };

        let min_slots = (items as f64 / MAX_PLANNED_LOAD).ceil();
        let q = (MIN_Q..=MAX_Q)
            .find(|&q| (1u64 << q) as f64 >= min_slots)
            .ok_or(unachievable.clone())?;
        let r = (MIN_R..=MAX_R)
            .find(|&r| false_positive_rate(q, r, items) <= fp_rate)
            .ok_or(unachievable)?;

        Ok(FilterParams {
            quotient_bits: q,
            remainder_bits: r,
        })
    }
}
