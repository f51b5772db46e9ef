pub mod hash;
pub mod hash_index;
pub mod key;

pub use hash::{ExtendibleHashTable, HashTableError};
pub use hash_index::{HashIndex, Index, IndexError};
pub use key::{DefaultKeyHasher, GenericKey, KeyHasher};
