use std::fmt;

use log::{debug, error, warn};

use crate::bit_plane::{BitPlane, PackedField};
use crate::error::{ConfigurationError, Error, Result};
use crate::hasher::{KeyHasher, Murmur3Hasher};
use crate::sizing::{self, FilterParams};

pub const MIN_Q: u8 = 3;
pub const MAX_Q: u8 = 33;
pub const MIN_R: u8 = 1;
pub const MAX_R: u8 = 63;
/// Upper bound on the packed size of all four planes.
pub const MAX_MEMORY_BYTES: u64 = 8 << 30;

/// Contents of one slot, copied out of the planes while the shift cascade carries it forward.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Slot {
    pub remainder: u64,
    pub is_occupied: bool,
    pub is_continued: bool,
    pub is_shifted: bool,
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        !self.is_occupied && !self.is_continued && !self.is_shifted
    }
}

/// Bytes taken by the three flag planes and the remainder plane.
pub(crate) fn packed_bytes(q: u8, r: u8) -> u64 {
    let slots = 1u64 << q;
    3 * slots.div_ceil(8) + (slots * r as u64).div_ceil(8)
}

fn validate(q: u8, r: u8) -> std::result::Result<(), ConfigurationError> {
    if !(MIN_Q..=MAX_Q).contains(&q) {
        return Err(ConfigurationError::QuotientBits(q));
    }
    if !(MIN_R..=MAX_R).contains(&r) {
        return Err(ConfigurationError::RemainderBits(r));
    }
    let needed = packed_bytes(q, r);
    if needed > MAX_MEMORY_BYTES {
        return Err(ConfigurationError::MemoryLimit { needed });
    }
    Ok(())
}

/// Approximate membership filter over `2^q` slots of `r`-bit remainders.
///
/// `contains` never returns `false` for a key that was added. It may return `true` for a key
/// that never was, with a probability of roughly [`estimate_false_positive_rate`].
///
/// The filter is not internally synchronized. `add` needs `&mut self` and `contains` only
/// `&self`, so sharing across threads goes through a `std::sync::RwLock`.
///
/// [`estimate_false_positive_rate`]: QuotientFilter::estimate_false_positive_rate
pub struct QuotientFilter<H = Murmur3Hasher> {
    pub(crate) q: u8,
    pub(crate) r: u8,
    pub(crate) entries: u64,
    pub(crate) size: u64,
    pub(crate) occupied: BitPlane,
    pub(crate) continuation: BitPlane,
    pub(crate) shifted: BitPlane,
    pub(crate) remainders: PackedField,
    pub(crate) hasher: H,
}

impl<H: KeyHasher> QuotientFilter<H> {
    pub fn new(q: u8, r: u8, hasher: H) -> Result<Self> {
        validate(q, r)?;
        let size = 1u64 << q;
        let filter = QuotientFilter {
            q,
            r,
            size,
            entries: 0,
            occupied: BitPlane::new(size)?,
            continuation: BitPlane::new(size)?,
            shifted: BitPlane::new(size)?,
            remainders: PackedField::new(size, r)?,
            hasher,
        };
        debug!(
            "quotient filter: slots={} q={} r={} flag bytes={} remainder bytes={}",
            size,
            q,
            r,
            3 * filter.occupied.as_raw_slice().len(),
            filter.remainders.as_raw_slice().len()
        );
        Ok(filter)
    }

    /// Sized for `items` keys at a target false positive rate, see [`FilterParams::for_accuracy`].
    pub fn from_probability(items: u64, fp_rate: f64, hasher: H) -> Result<Self> {
        let params = FilterParams::for_accuracy(items, fp_rate)?;
        Self::new(params.quotient_bits, params.remainder_bits, hasher)
    }

    /// Adds `key`. Returns `Ok(false)` when its fingerprint is already stored.
    pub fn add(&mut self, key: &[u8]) -> Result<bool> {
        let (quotient, remainder) = self.split(key);
        self.insert_fingerprint(quotient, remainder)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        let (quotient, remainder) = self.split(key);
        self.contains_fingerprint(quotient, remainder)
    }

    fn split(&self, key: &[u8]) -> (u64, u64) {
        let (high, low) = self.hasher.hash_key(key);
        let quotient = high & (self.size - 1);
        let remainder = low & self.remainder_mask();
        (quotient, remainder)
    }
}

impl<H> QuotientFilter<H> {
    pub fn slot_count(&self) -> u64 {
        self.size
    }

    pub fn element_count(&self) -> u64 {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn load_factor(&self) -> f64 {
        self.entries as f64 / self.size as f64
    }

    pub fn quotient_bits(&self) -> u8 {
        self.q
    }

    pub fn remainder_bits(&self) -> u8 {
        self.r
    }

    /// Bits of storage per slot: the remainder plus three flags.
    pub fn slot_bits(&self) -> u8 {
        self.r + 3
    }

    pub fn memory_bytes(&self) -> u64 {
        packed_bytes(self.q, self.r)
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Estimated false positive rate once `items` distinct keys have been added.
    pub fn estimate_false_positive_rate(&self, items: u64) -> f64 {
        sizing::false_positive_rate(self.q, self.r, items)
    }

    /// Number of distinct keys the filter takes before the estimated false positive rate
    /// reaches `fp_rate`, capped at the slot count.
    pub fn estimate_capacity(&self, fp_rate: f64) -> u64 {
        sizing::capacity(self.q, self.r, fp_rate)
    }

    /// Empties the filter, keeping its allocation.
    pub fn clear(&mut self) {
        self.occupied.clear();
        self.continuation.clear();
        self.shifted.clear();
        self.remainders.clear();
        self.entries = 0;
    }

    #[inline]
    fn remainder_mask(&self) -> u64 {
        (1u64 << self.r) - 1
    }

    #[inline]
    fn next(&self, i: u64) -> u64 {
        (i + 1) % self.size
    }

    #[inline]
    pub(crate) fn prev(&self, i: u64) -> u64 {
        (i + self.size - 1) % self.size
    }

    pub(crate) fn slot(&self, i: u64) -> Slot {
        Slot {
            remainder: self.remainders.get(i),
            is_occupied: self.occupied.get(i),
            is_continued: self.continuation.get(i),
            is_shifted: self.shifted.get(i),
        }
    }

    #[inline]
    pub(crate) fn is_empty_slot(&self, i: u64) -> bool {
        !self.occupied.get(i) && !self.continuation.get(i) && !self.shifted.get(i)
    }

    /// Walks back from `home` to the start of its cluster.
    ///
    /// Returns the cluster start and the number of runs to skip from there plus one: every
    /// occupied quotient in `[start, home)` owns one run ahead of `home`'s.
    fn find_cluster_start(&self, home: u64) -> Result<(u64, u64)> {
        let mut b = home;
        let mut runs = 1;
        let mut steps = 0;
        while self.shifted.get(b) {
            b = self.prev(b);
            if self.occupied.get(b) {
                runs += 1;
            }
            steps += 1;
            if steps >= self.size {
                return Err(self.violation(home, "every slot is shifted"));
            }
        }
        if !self.occupied.get(b) {
            return Err(self.violation(b, "cluster starts on an unoccupied slot"));
        }
        Ok((b, runs))
    }

    /// Skips `runs - 1` runs forward from `cluster_start`. For a quotient without a run this
    /// lands where its run has to begin.
    fn find_run_start(&self, cluster_start: u64, mut runs: u64) -> Result<u64> {
        let mut s = cluster_start;
        let mut steps = 0;
        while runs > 1 {
            s = self.next(s);
            if !self.continuation.get(s) {
                runs -= 1;
            }
            steps += 1;
            if steps > self.size {
                return Err(self.violation(cluster_start, "fewer run heads than occupied quotients"));
            }
        }
        Ok(s)
    }

    /// Steps from the head of a run to the next slot. `Ok(None)` once the run has ended.
    #[inline]
    fn next_in_run(&self, run_start: u64, s: u64, steps: &mut u64) -> Result<Option<u64>> {
        *steps += 1;
        if *steps > self.size {
            return Err(self.violation(run_start, "run never ends"));
        }
        let s = self.next(s);
        Ok(self.continuation.get(s).then_some(s))
    }

    /// First slot at or after `from` that holds nothing.
    fn find_empty(&self, from: u64) -> Result<u64> {
        let mut s = from;
        for _ in 0..self.size {
            if self.is_empty_slot(s) {
                return Ok(s);
            }
            s = self.next(s);
        }
        Err(self.violation(from, "no empty slot below capacity"))
    }

    #[cold]
    fn violation(&self, slot: u64, detail: &'static str) -> Error {
        error!("quotient filter corrupt at slot {}: {}", slot, detail);
        Error::InvariantViolation { slot, detail }
    }

    pub(crate) fn insert_fingerprint(&mut self, quotient: u64, remainder: u64) -> Result<bool> {
        let q_idx = quotient;

        // if the home slot is empty, insert directly
        if self.is_empty_slot(q_idx) {
            self.occupied.set(q_idx, true);
            self.remainders.set(q_idx, remainder);
            self.entries += 1;
            return Ok(true);
        }

        let run_exists = self.occupied.get(q_idx);
        let (cluster_start, runs) = self.find_cluster_start(q_idx)?;
        let run_start = self.find_run_start(cluster_start, runs)?;

        // find the insertion point, keeping the run sorted
        let mut s = run_start;
        if run_exists {
            let mut steps = 0;
            loop {
                let stored = self.remainders.get(s);
                if stored == remainder {
                    return Ok(false);
                }
                if stored > remainder {
                    break;
                }
                match self.next_in_run(run_start, s, &mut steps)? {
                    Some(next) => s = next,
                    None => {
                        s = self.next(s);
                        break;
                    }
                }
            }
        }

        if self.entries >= self.size {
            warn!("quotient filter full: {} of {} slots used", self.entries, self.size);
            return Err(Error::CapacityExceeded { slots: self.size });
        }

        // nothing is written unless the cascade is known to end
        let end = self.find_empty(s)?;
        let new_head = run_exists && s == run_start;
        let mut carried = self.slot(s);
        self.write_entry(s, remainder, run_exists && s != run_start, s != q_idx);

        // shift the displaced entries forward until one lands in the empty slot
        let mut first = true;
        while s != end {
            debug_assert!(!carried.is_empty());
            s = self.next(s);
            let displaced = self.slot(s);
            // the old head of the run now follows the new one
            let is_continued = carried.is_continued || (first && new_head);
            self.write_entry(s, carried.remainder, is_continued, true);
            carried = displaced;
            first = false;
        }

        if !run_exists {
            self.occupied.set(q_idx, true);
        }
        self.entries += 1;
        Ok(true)
    }

    /// Writes the remainder and the run flags at `i`. `occupied` belongs to the quotient `i`
    /// and stays as it is.
    #[inline]
    fn write_entry(&mut self, i: u64, remainder: u64, is_continued: bool, is_shifted: bool) {
        self.remainders.set(i, remainder);
        self.continuation.set(i, is_continued);
        self.shifted.set(i, is_shifted);
    }

    pub(crate) fn contains_fingerprint(&self, quotient: u64, remainder: u64) -> Result<bool> {
        if !self.occupied.get(quotient) {
            return Ok(false);
        }
        let (cluster_start, runs) = self.find_cluster_start(quotient)?;
        let run_start = self.find_run_start(cluster_start, runs)?;
        let mut s = run_start;
        let mut steps = 0;
        loop {
            let stored = self.remainders.get(s);
            if stored == remainder {
                return Ok(true);
            }
            if stored > remainder {
                return Ok(false);
            }
            match self.next_in_run(run_start, s, &mut steps)? {
                Some(next) => s = next,
                None => return Ok(false),
            }
        }
    }
}

impl<H> fmt::Debug for QuotientFilter<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotientFilter")
            .field("q", &self.q)
            .field("r", &self.r)
            .field("entries", &self.entries)
            .field("size", &self.size)
            .field("planes", &"[..]")
            .finish()
    }
}

impl<H> fmt::Display for QuotientFilter<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "slots: {}", self.size)?;
        writeln!(f, "quotient bits: {}", self.q)?;
        writeln!(f, "remainder bits: {}", self.r)?;
        writeln!(f, "slot bits: {}", self.slot_bits())?;
        writeln!(f, "bytes: {}", self.memory_bytes())?;
        writeln!(f, "elements: {}", self.entries)?;
        write!(f, "load factor: {:.4}", self.load_factor())
    }
}
