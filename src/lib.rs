//! A quotient filter: approximate set membership over bit-packed slots.
//!
//! Keys are hashed into a quotient, which picks a home slot, and a remainder, which is stored
//! as the fingerprint. Colliding quotients are kept in sorted runs and pushed forward into
//! clusters, tracked by three flag bits per slot.
//!
//! ```
//! use packed_qf::{Murmur3Hasher, QuotientFilter};
//!
//! let mut filter = QuotientFilter::new(10, 8, Murmur3Hasher::default()).unwrap();
//! assert!(filter.add(b"apple").unwrap());
//! assert!(!filter.add(b"apple").unwrap());
//! assert!(filter.contains(b"apple").unwrap());
//! assert_eq!(filter.element_count(), 1);
//! ```

pub mod bit_plane;
pub mod builder;
pub mod error;
pub mod hasher;
pub mod log;
pub mod persist;
pub mod quotient_filter;
pub mod set_ops;
pub mod sizing;

pub use builder::QuotientFilterBuilder;
pub use error::{ConfigurationError, Error, Result};
pub use hasher::{KeyHasher, Murmur3Hasher};
pub use quotient_filter::QuotientFilter;
pub use set_ops::Fingerprints;
pub use sizing::FilterParams;
