use std::sync::Arc;

use thiserror::Error;

use crate::common::types::Rid;
use crate::index::hash::{ExtendibleHashTable, HashTableError};
use crate::index::key::{DefaultKeyHasher, GenericKey};
use crate::storage::buffer::ParallelBufferPool;
use crate::storage::tuple::Tuple;

/// Fixed width of an encoded index key. A bincode-encoded single
/// integer column takes 20 bytes; two fit exactly.
pub const INDEX_KEY_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Key/value pair already present in index")]
    DuplicateEntry,

    #[error("Encoded index key is too large")]
    KeyTooLarge,

    #[error("Hash table error: {0}")]
    HashTable(HashTableError),
}

impl From<HashTableError> for IndexError {
    fn from(e: HashTableError) -> Self {
        match e {
            HashTableError::DuplicateKey => IndexError::DuplicateEntry,
            other => IndexError::HashTable(other),
        }
    }
}

/// Secondary-index contract consumed by the mutating executors
pub trait Index: Send + Sync {
    fn insert_entry(&self, key: &Tuple, rid: Rid) -> Result<(), IndexError>;
    fn delete_entry(&self, key: &Tuple, rid: Rid) -> Result<(), IndexError>;
    fn scan_key(&self, key: &Tuple) -> Result<Vec<Rid>, IndexError>;
}

/// Extendible-hash-backed secondary index
pub struct HashIndex {
    table: ExtendibleHashTable<GenericKey<INDEX_KEY_SIZE>, Rid, DefaultKeyHasher>,
}

impl HashIndex {
    pub fn new(buffer_pool: Arc<ParallelBufferPool>) -> Result<Self, IndexError> {
        let table = ExtendibleHashTable::new(buffer_pool, DefaultKeyHasher)?;
        Ok(Self { table })
    }

    fn encode(key: &Tuple) -> Result<GenericKey<INDEX_KEY_SIZE>, IndexError> {
        GenericKey::from_tuple(key).ok_or(IndexError::KeyTooLarge)
    }
}

impl Index for HashIndex {
    fn insert_entry(&self, key: &Tuple, rid: Rid) -> Result<(), IndexError> {
        let encoded = Self::encode(key)?;
        self.table.insert(&encoded, &rid)?;
        Ok(())
    }

    fn delete_entry(&self, key: &Tuple, rid: Rid) -> Result<(), IndexError> {
        let encoded = Self::encode(key)?;
        // removing an absent entry is a no-op, matching the heap's
        // deferred-delete behavior on rollback
        self.table.remove(&encoded, &rid)?;
        Ok(())
    }

    fn scan_key(&self, key: &Tuple) -> Result<Vec<Rid>, IndexError> {
        let encoded = Self::encode(key)?;
        Ok(self.table.get_value(&encoded)?)
    }
}
