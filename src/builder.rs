use crate::error::Result;
use crate::hasher::{KeyHasher, Murmur3Hasher};
use crate::quotient_filter::QuotientFilter;
use crate::sizing::FilterParams;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Sizing {
    Bits { q: u8, r: u8 },
    Accuracy { items: u64, fp_rate: f64 },
}

/// Builder for [`QuotientFilter`].
///
/// Either give the layout directly with [`with_bits`](Self::with_bits) or let
/// [`with_accuracy`](Self::with_accuracy) pick it. Validation happens in [`build`](Self::build).
///
/// ```
/// use packed_qf::QuotientFilterBuilder;
///
/// let mut filter = QuotientFilterBuilder::with_accuracy(10_000, 0.001)
///     .seed(42)
///     .build()
///     .unwrap();
/// filter.add(b"hello").unwrap();
/// assert!(filter.contains(b"hello").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct QuotientFilterBuilder<H = Murmur3Hasher> {
    sizing: Sizing,
    hasher: H,
}

impl QuotientFilterBuilder<Murmur3Hasher> {
    pub fn with_bits(quotient_bits: u8, remainder_bits: u8) -> Self {
        QuotientFilterBuilder {
            sizing: Sizing::Bits {
                q: quotient_bits,
                r: remainder_bits,
            },
            hasher: Murmur3Hasher::default(),
        }
    }

    /// Sized for `items` keys at a false positive rate of at most `fp_rate`.
    pub fn with_accuracy(items: u64, fp_rate: f64) -> Self {
        QuotientFilterBuilder {
            sizing: Sizing::Accuracy { items, fp_rate },
            hasher: Murmur3Hasher::default(),
        }
    }

    /// Seeds the default hasher. Filters with different seeds cannot be merged.
    pub fn seed(mut self, seed: u64) -> Self {
        self.hasher = Murmur3Hasher::with_seed(seed);
        self
    }
}

impl<H: KeyHasher> QuotientFilterBuilder<H> {
    pub fn hasher<H2: KeyHasher>(self, hasher: H2) -> QuotientFilterBuilder<H2> {
        QuotientFilterBuilder {
            sizing: self.sizing,
            hasher,
        }
    }

    /// The `(q, r)` pair `build` will use.
    pub fn params(&self) -> Result<FilterParams> {
        Ok(match self.sizing {
            Sizing::Bits { q, r } => FilterParams {
                quotient_bits: q,
                remainder_bits: r,
            },
            Sizing::Accuracy { items, fp_rate } => FilterParams::for_accuracy(items, fp_rate)?,
        })
    }

    pub fn build(self) -> Result<QuotientFilter<H>> {
        let params = self.params()?;
        QuotientFilter::new(params.quotient_bits, params.remainder_bits, self.hasher)
    }
}
