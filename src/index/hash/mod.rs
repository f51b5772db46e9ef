pub mod table;

pub use table::{ExtendibleHashTable, HashTableError};
