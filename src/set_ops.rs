//! Enumeration of stored fingerprints, and union/intersection built on top of it.

use log::debug;

use crate::error::{Error, Result};
use crate::quotient_filter::QuotientFilter;

/// Iterator over the `(quotient, remainder)` pairs stored in a filter, in slot order.
///
/// Quotients are recovered from the flag planes alone: a run that is not shifted sits on its
/// own quotient, and every later run in the same cluster belongs to the next occupied quotient.
pub struct Fingerprints<'a, H> {
    filter: &'a QuotientFilter<H>,
    start: u64,
    visited: u64,
    quotient: Option<u64>,
}

impl<'a, H> Fingerprints<'a, H> {
    fn new(filter: &'a QuotientFilter<H>) -> Self {
        let size = filter.size;
        // begin outside any cluster, or on a cluster start if every slot is in use
        let start = (0..size)
            .find(|&i| filter.is_empty_slot(i))
            .or_else(|| (0..size).find(|&i| !filter.shifted.get(i)))
            .unwrap_or(0);
        Fingerprints {
            filter,
            start,
            visited: if filter.is_empty() { size } else { 0 },
            quotient: None,
        }
    }
}

impl<H> Iterator for Fingerprints<'_, H> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let qf = self.filter;
        while self.visited < qf.size {
            let i = (self.start + self.visited) % qf.size;
            self.visited += 1;
            if qf.is_empty_slot(i) {
                self.quotient = None;
                continue;
            }
            if !qf.continuation.get(i) {
                let quotient = match self.quotient {
                    Some(prev) if qf.shifted.get(i) => {
                        let found = (1..=qf.size)
                            .map(|k| (prev + k) % qf.size)
                            .find(|&c| qf.occupied.get(c));
                        match found {
                            Some(c) => c,
                            None => {
                                // planes with no occupied quotient for this run
                                self.visited = qf.size;
                                return None;
                            }
                        }
                    }
                    _ => i,
                };
                self.quotient = Some(quotient);
            }
            let quotient = self.quotient.unwrap_or(i);
            return Some((quotient, qf.remainders.get(i)));
        }
        None
    }
}

impl<H> QuotientFilter<H> {
    pub fn fingerprints(&self) -> Fingerprints<'_, H> {
        Fingerprints::new(self)
    }

    fn check_compatible<O>(&self, other: &QuotientFilter<O>) -> Result<()> {
        if self.q != other.q || self.r != other.r {
            return Err(Error::IncompatibleFilters {
                q: self.q,
                r: self.r,
                other_q: other.q,
                other_r: other.r,
            });
        }
        Ok(())
    }

    /// Adds every fingerprint stored in `other`.
    ///
    /// Both filters must share `q`, `r` and the hash function. On `CapacityExceeded` the
    /// fingerprints merged so far stay in place and the filter remains valid.
    pub fn union_with<O>(&mut self, other: &QuotientFilter<O>) -> Result<()> {
        self.check_compatible(other)?;
        let before = self.entries;
        for (quotient, remainder) in other.fingerprints() {
            self.insert_fingerprint(quotient, remainder)?;
        }
        debug!(
            "union: {} + {} entries -> {}",
            before, other.entries, self.entries
        );
        Ok(())
    }

    /// Keeps only the fingerprints that `other` also stores.
    pub fn intersect_with<O>(&mut self, other: &QuotientFilter<O>) -> Result<()> {
        self.check_compatible(other)?;
        let before = self.entries;
        let mut kept = Vec::new();
        for (quotient, remainder) in self.fingerprints() {
            if other.contains_fingerprint(quotient, remainder)? {
                kept.push((quotient, remainder));
            }
        }
        self.clear();
        for (quotient, remainder) in kept {
            self.insert_fingerprint(quotient, remainder)?;
        }
        debug!(
            "intersection: {} and {} entries -> {}",
            before, other.entries, self.entries
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::error::Error;
    use crate::hasher::Murmur3Hasher;
    use crate::quotient_filter::QuotientFilter;

    fn direct(key: &[u8]) -> (u64, u64) {
        (key[0] as u64, key[1] as u64)
    }

    fn direct_filter(q: u8, r: u8) -> QuotientFilter<fn(&[u8]) -> (u64, u64)> {
        QuotientFilter::new(q, r, direct as fn(&[u8]) -> (u64, u64)).unwrap()
    }

    fn stored<H>(qf: &QuotientFilter<H>) -> BTreeSet<(u64, u64)> {
        qf.fingerprints().collect()
    }

    #[test]
    fn test_fingerprints_empty() {
        let qf = direct_filter(4, 4);
        assert_eq!(qf.fingerprints().count(), 0);
    }

    #[test]
    fn test_fingerprints_stop_without_occupied_quotient() {
        let mut qf = direct_filter(3, 4);
        qf.shifted.set(0, true);
        qf.shifted.set(1, true);
        qf.entries = 1;
        assert!(qf.fingerprints().count() <= 2);
    }

    #[test]
    fn test_fingerprints_recover_quotients() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut qf = direct_filter(6, 6);
            let mut model = BTreeSet::new();
            for _ in 0..rng.random_range(1..=64) {
                let (q, r) = (rng.random_range(0..64u8), rng.random_range(0..64u8));
                qf.add(&[q, r]).unwrap();
                model.insert((q as u64, r as u64));
            }
            let listed: Vec<_> = qf.fingerprints().collect();
            assert_eq!(listed.len() as u64, qf.element_count());
            assert_eq!(listed.into_iter().collect::<BTreeSet<_>>(), model);
        }
    }

    #[test]
    fn test_fingerprints_of_full_filter() {
        let mut qf = direct_filter(3, 4);
        for i in 0..8u8 {
            qf.add(&[i / 2 + 4, i]).unwrap();
        }
        assert_eq!(qf.load_factor(), 1.0);
        let expected: BTreeSet<_> = (0..8u64).map(|i| (i / 2 + 4, i)).collect();
        assert_eq!(stored(&qf), expected);
    }

    #[test]
    fn test_union() {
        let mut a = direct_filter(5, 4);
        let mut b = direct_filter(5, 4);
        for (q, r) in [(1, 1), (1, 2), (3, 5), (30, 4)] {
            a.add(&[q, r]).unwrap();
        }
        for (q, r) in [(1, 2), (2, 9), (31, 0), (31, 1)] {
            b.add(&[q, r]).unwrap();
        }
        a.union_with(&b).unwrap();
        assert_eq!(a.element_count(), 7);
        for (q, r) in [(1, 1), (1, 2), (3, 5), (30, 4), (2, 9), (31, 0), (31, 1)] {
            assert!(a.contains(&[q, r]).unwrap());
        }
        assert_eq!(stored(&b).len(), 4);
    }

    #[test]
    fn test_intersection() {
        let mut a = direct_filter(5, 4);
        let mut b = direct_filter(5, 4);
        for (q, r) in [(1, 1), (1, 2), (2, 3), (3, 5), (31, 4)] {
            a.add(&[q, r]).unwrap();
        }
        for (q, r) in [(1, 2), (3, 5), (3, 6), (31, 4)] {
            b.add(&[q, r]).unwrap();
        }
        a.intersect_with(&b).unwrap();
        assert_eq!(
            stored(&a),
            [(1, 2), (3, 5), (31, 4)].into_iter().collect::<BTreeSet<_>>()
        );
        assert_eq!(a.element_count(), 3);
        assert!(!a.contains(&[1, 1]).unwrap());
    }

    #[test]
    fn test_incompatible_filters() {
        let mut a = QuotientFilter::new(10, 8, Murmur3Hasher::default()).unwrap();
        let b = QuotientFilter::new(10, 9, Murmur3Hasher::default()).unwrap();
        assert!(matches!(
            a.union_with(&b),
            Err(Error::IncompatibleFilters { r: 8, other_r: 9, .. })
        ));
        assert!(matches!(
            a.intersect_with(&b),
            Err(Error::IncompatibleFilters { .. })
        ));
    }

    #[test]
    fn test_union_of_keyed_filters() {
        let mut evens = QuotientFilter::from_probability(2000, 0.01, Murmur3Hasher::default())
            .unwrap();
        let mut thirds = QuotientFilter::from_probability(2000, 0.01, Murmur3Hasher::default())
            .unwrap();
        for i in (0..3000).step_by(2) {
            evens.add(format!("K{i}").as_bytes()).unwrap();
        }
        for i in (0..3000).step_by(3) {
            thirds.add(format!("K{i}").as_bytes()).unwrap();
        }
        evens.union_with(&thirds).unwrap();
        for i in (0..3000).filter(|i| i % 2 == 0 || i % 3 == 0) {
            assert!(evens.contains(format!("K{i}").as_bytes()).unwrap());
        }

        thirds.intersect_with(&evens).unwrap();
        for i in (0..3000).step_by(3) {
            assert!(thirds.contains(format!("K{i}").as_bytes()).unwrap());
        }
    }
}
