//! Densely packed storage planes backing the filter.
//!
//! Both planes address their slots modulo the plane length, so callers can walk past the last
//! slot and land on slot 0. Bits are numbered most-significant-first inside each byte, which is
//! also the on-disk layout.

use bitvec::prelude::*;

use crate::error::ConfigurationError;

type Bits = BitVec<u8, Msb0>;

fn allocate(bits: u64) -> Result<Bits, ConfigurationError> {
    let len: usize = bits
        .try_into()
        .map_err(|_| ConfigurationError::Unaddressable { bits })?;
    if len > BitSlice::<u8, Msb0>::MAX_BITS {
        return Err(ConfigurationError::Unaddressable { bits });
    }
    Ok(BitVec::repeat(false, len))
}

fn from_raw(bytes: Vec<u8>, bits: usize) -> Option<Bits> {
    if bytes.len() != bits.div_ceil(8) {
        return None;
    }
    let mut vec = Bits::from_vec(bytes);
    vec.truncate(bits);
    Some(vec)
}

/// One bit per slot.
#[derive(Clone)]
pub struct BitPlane {
    bits: Bits,
}

impl BitPlane {
    pub fn new(slots: u64) -> Result<Self, ConfigurationError> {
        Ok(BitPlane {
            bits: allocate(slots)?,
        })
    }

    /// Rebuilds a plane of `slots` bits from its raw bytes, `None` on a length mismatch.
    pub fn from_raw(bytes: Vec<u8>, slots: usize) -> Option<Self> {
        from_raw(bytes, slots).map(|bits| BitPlane { bits })
    }

    fn len(&self) -> u64 {
        self.bits.len() as u64
    }

    #[inline]
    fn wrap(&self, i: u64) -> usize {
        (i % self.len()) as usize
    }

    #[inline]
    pub fn get(&self, i: u64) -> bool {
        self.bits[self.wrap(i)]
    }

    #[inline]
    pub fn set(&mut self, i: u64, value: bool) {
        let idx = self.wrap(i);
        self.bits.set(idx, value);
    }

    pub(crate) fn count_ones(&self) -> u64 {
        self.bits.count_ones() as u64
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    pub fn as_raw_slice(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }
}

/// Fixed-width unsigned fields, `width` bits per slot, packed back to back.
///
/// Slot `i` lives at bit range `[i * width, (i + 1) * width)` and may straddle up to nine
/// bytes for a 63 bit width. Writes only touch that range.
#[derive(Clone)]
pub struct PackedField {
    bits: Bits,
    width: u8,
    slots: u64,
    mask: u64,
}

impl PackedField {
    pub fn new(slots: u64, width: u8) -> Result<Self, ConfigurationError> {
        debug_assert!((1..=64).contains(&width));
        let total = slots
            .checked_mul(width as u64)
            .ok_or(ConfigurationError::Unaddressable { bits: u64::MAX })?;
        Ok(PackedField {
            bits: allocate(total)?,
            width,
            slots,
            mask: field_mask(width),
        })
    }

    pub fn from_raw(bytes: Vec<u8>, slots: u64, width: u8) -> Option<Self> {
        let total = usize::try_from(slots.checked_mul(width as u64)?).ok()?;
        from_raw(bytes, total).map(|bits| PackedField {
            bits,
            width,
            slots,
            mask: field_mask(width),
        })
    }

    #[inline]
    fn range(&self, i: u64) -> std::ops::Range<usize> {
        let start = (i % self.slots) as usize * self.width as usize;
        start..start + self.width as usize
    }

    #[inline]
    pub fn get(&self, i: u64) -> u64 {
        let range = self.range(i);
        self.bits[range].load_be::<u64>()
    }

    /// Stores the low `width` bits of `value`; higher bits are discarded.
    #[inline]
    pub fn set(&mut self, i: u64, value: u64) {
        let range = self.range(i);
        let value = value & self.mask;
        self.bits[range].store_be::<u64>(value);
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    pub fn as_raw_slice(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }
}

#[inline]
fn field_mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}
