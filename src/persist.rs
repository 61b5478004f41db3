//! Byte layout of a filter:
//!
//! ```text
//! q            u8
//! r            u8
//! n            u64, little endian
//! occupied     ceil(slots / 8) bytes
//! continuation ceil(slots / 8) bytes
//! shifted      ceil(slots / 8) bytes
//! remainders   ceil(slots * r / 8) bytes
//! ```
//!
//! Planes are copied verbatim, bits most-significant first. The hash function is not stored; the
//! reader has to supply the one the filter was built with.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::bit_plane::{BitPlane, PackedField};
use crate::error::{Error, Result};
use crate::hasher::KeyHasher;
use crate::quotient_filter::QuotientFilter;

pub const HEADER_BYTES: usize = 10;

fn read_plane<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let len = usize::try_from(len).map_err(|_| Error::Corrupt("plane too large"))?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

impl<H> QuotientFilter<H> {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.q)?;
        writer.write_u8(self.r)?;
        writer.write_u64::<LittleEndian>(self.entries)?;
        writer.write_all(self.occupied.as_raw_slice())?;
        writer.write_all(self.continuation.as_raw_slice())?;
        writer.write_all(self.shifted.as_raw_slice())?;
        writer.write_all(self.remainders.as_raw_slice())?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_BYTES + self.memory_bytes() as usize);
        self.write_to(&mut buf)
            .expect("writing into a Vec cannot fail");
        buf
    }

    /// Checks that decoded planes describe well-formed clusters, so that no walk over them
    /// can run past the slot count.
    fn check_planes(&self) -> Result<()> {
        let mut stored = 0;
        let mut run_heads = 0;
        let mut cluster_starts = 0;
        for i in 0..self.size {
            if self.is_empty_slot(i) {
                continue;
            }
            stored += 1;
            let is_shifted = self.shifted.get(i);
            let is_continued = self.continuation.get(i);
            if is_continued && !is_shifted {
                return Err(Error::Corrupt("continuation without shifted"));
            }
            if is_shifted && self.is_empty_slot(self.prev(i)) {
                return Err(Error::Corrupt("shifted slot after an empty slot"));
            }
            if !is_shifted {
                if !self.occupied.get(i) {
                    return Err(Error::Corrupt("cluster starts on an unoccupied slot"));
                }
                cluster_starts += 1;
            }
            if !is_continued {
                run_heads += 1;
            }
        }
        if stored != self.entries {
            return Err(Error::Corrupt("entry count does not match the planes"));
        }
        if stored > 0 && cluster_starts == 0 {
            return Err(Error::Corrupt("no cluster start"));
        }
        if run_heads != self.occupied.count_ones() {
            return Err(Error::Corrupt("runs do not match occupied quotients"));
        }
        Ok(())
    }
}

impl<H: KeyHasher> QuotientFilter<H> {
    pub fn read_from<R: Read>(reader: &mut R, hasher: H) -> Result<Self> {
        let q = reader.read_u8()?;
        let r = reader.read_u8()?;
        let entries = reader.read_u64::<LittleEndian>()?;
        // validates q and r before anything large is allocated
        let mut filter = QuotientFilter::new(q, r, hasher)?;
        if entries > filter.size {
            return Err(Error::Corrupt("more entries than slots"));
        }

        let size = filter.size;
        let flag_bytes = size.div_ceil(8);
        let corrupt = || Error::Corrupt("plane length mismatch");
        filter.occupied =
            BitPlane::from_raw(read_plane(reader, flag_bytes)?, size as usize).ok_or_else(corrupt)?;
        filter.continuation =
            BitPlane::from_raw(read_plane(reader, flag_bytes)?, size as usize).ok_or_else(corrupt)?;
        filter.shifted =
            BitPlane::from_raw(read_plane(reader, flag_bytes)?, size as usize).ok_or_else(corrupt)?;
        let remainder_bytes = (size * r as u64).div_ceil(8);
        filter.remainders = PackedField::from_raw(read_plane(reader, remainder_bytes)?, size, r)
            .ok_or_else(corrupt)?;
        filter.entries = entries;
        filter.check_planes()?;

        debug!("loaded quotient filter: q={} r={} n={}", q, r, entries);
        Ok(filter)
    }

    /// Decodes a filter from exactly the bytes [`to_bytes`](Self::to_bytes) produced.
    pub fn from_bytes(mut bytes: &[u8], hasher: H) -> Result<Self> {
        let filter = Self::read_from(&mut bytes, hasher)?;
        if !bytes.is_empty() {
            return Err(Error::Corrupt("trailing bytes"));
        }
        Ok(filter)
    }
}
