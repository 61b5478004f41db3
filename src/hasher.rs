use murmurhash3::murmurhash3_x64_128 as mmh3;

/// Turns a key into a digest of two independent 64-bit words.
///
/// The filter takes its quotient from the first word and its remainder from the second, so
/// the two never share digest bits. Implementations must be pure functions of the key bytes.
pub trait KeyHasher {
    fn hash_key(&self, key: &[u8]) -> (u64, u64);
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> (u64, u64),
{
    fn hash_key(&self, key: &[u8]) -> (u64, u64) {
        self(key)
    }
}

/// MurmurHash3 x64/128; the two halves of the 128-bit output are the digest words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Murmur3Hasher {
    seed: u64,
}

impl Murmur3Hasher {
    pub const DEFAULT_SEED: u64 = 0x5146_5f53_4545_4421;

    pub fn with_seed(seed: u64) -> Self {
        Murmur3Hasher { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for Murmur3Hasher {
    fn default() -> Self {
        Murmur3Hasher::with_seed(Self::DEFAULT_SEED)
    }
}

impl KeyHasher for Murmur3Hasher {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> (u64, u64) {
        mmh3(key, self.seed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_murmur_is_deterministic() {
        let h = Murmur3Hasher::default();
        assert_eq!(h.hash_key(b"apple"), h.hash_key(b"apple"));
        assert_ne!(h.hash_key(b"apple"), h.hash_key(b"apples"));
    }

    #[test]
    fn test_seed_changes_digest() {
        let a = Murmur3Hasher::with_seed(1);
        let b = Murmur3Hasher::with_seed(2);
        assert_ne!(a.hash_key(b"key"), b.hash_key(b"key"));
        assert_eq!(a.seed(), 1);
    }

    #[test]
    fn test_closure_hasher() {
        let h = |key: &[u8]| (key[0] as u64, key[1] as u64);
        assert_eq!(h.hash_key(&[2, 5]), (2, 5));
    }
}
