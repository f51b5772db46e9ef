use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::storage::page::FixedBytes;
use crate::storage::tuple::Tuple;

/// Fixed-width index key holding the bincode image of a key tuple,
/// zero-padded. Distinct key tuples of one schema encode to distinct
/// byte strings, so byte equality is key equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    /// Encode a key tuple; fails when the encoding exceeds `N` bytes
    pub fn from_tuple(tuple: &Tuple) -> Option<Self> {
        let bytes = tuple.to_bytes().ok()?;
        if bytes.len() > N {
            return None;
        }
        let mut data = [0u8; N];
        data[..bytes.len()].copy_from_slice(&bytes);
        Some(Self { data })
    }
}

impl<const N: usize> FixedBytes for GenericKey<N> {
    const LEN: usize = N;

    fn write_to(&self, dst: &mut [u8]) {
        dst[..N].copy_from_slice(&self.data);
    }

    fn read_from(src: &[u8]) -> Self {
        let mut data = [0u8; N];
        data.copy_from_slice(&src[..N]);
        Self { data }
    }
}

/// Pluggable hash function for the extendible hash table. Tests swap in
/// deterministic hashers to steer keys into chosen buckets.
pub trait KeyHasher<K>: Send + Sync {
    fn hash_key(&self, key: &K) -> u32;
}

/// Hashes through the standard library's SipHash
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKeyHasher;

impl<K: Hash> KeyHasher<K> for DefaultKeyHasher {
    fn hash_key(&self, key: &K) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tuple::Datum;

    #[test]
    fn test_generic_key_roundtrip() {
        let tuple = Tuple::new(vec![Datum::Int(7)]);
        let key = GenericKey::<32>::from_tuple(&tuple).unwrap();

        let mut buffer = [0u8; 32];
        key.write_to(&mut buffer);
        assert_eq!(GenericKey::<32>::read_from(&buffer), key);
    }

    #[test]
    fn test_oversized_key_rejected() {
        let tuple = Tuple::new(vec![Datum::Str("far too long for four bytes".into())]);
        assert!(GenericKey::<4>::from_tuple(&tuple).is_none());
    }

    #[test]
    fn test_distinct_tuples_distinct_keys() {
        let a = GenericKey::<32>::from_tuple(&Tuple::new(vec![Datum::Int(1)])).unwrap();
        let b = GenericKey::<32>::from_tuple(&Tuple::new(vec![Datum::Int(2)])).unwrap();
        assert_ne!(a, b);
    }
}
