// Extendible hash table over buffer-pool pages
//
// One directory page maps hash prefixes to bucket pages. A table-wide
// latch linearizes structural changes (directory doubling, bucket splits,
// merges, shrinks) against readers; per-page latches protect contents.
// Latch discipline everywhere: pin, then latch, then unlatch, then unpin.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::common::types::{PageId, INVALID_PAGE_ID};
use crate::index::key::KeyHasher;
use crate::storage::buffer::{BufferPoolError, ParallelBufferPool};
use crate::storage::page::directory_page::{DirectoryMut, DirectoryRef, MAX_DEPTH};
use crate::storage::page::{BucketMut, BucketRef, FixedBytes, PageError};

#[derive(Error, Debug)]
pub enum HashTableError {
    #[error("Key/value pair already present")]
    DuplicateKey,

    #[error("Bucket cannot be split further")]
    BucketFull,

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),
}

pub struct ExtendibleHashTable<K, V, H> {
    buffer_pool: Arc<ParallelBufferPool>,
    directory_page_id: PageId,
    table_latch: RwLock<()>,
    hasher: H,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, H> ExtendibleHashTable<K, V, H>
where
    K: FixedBytes,
    V: FixedBytes,
    H: KeyHasher<K>,
{
    /// Create a table with an empty directory pointing at one bucket
    pub fn new(buffer_pool: Arc<ParallelBufferPool>, hasher: H) -> Result<Self, HashTableError> {
        let (directory_page_id, dir_ptr) = buffer_pool.new_page()?;
        let (bucket_page_id, _bucket_ptr) = match buffer_pool.new_page() {
            Ok(pair) => pair,
            Err(e) => {
                buffer_pool.unpin_page(directory_page_id, false)?;
                return Err(e.into());
            }
        };

        {
            let mut dir_page = dir_ptr.write();
            DirectoryMut::init(&mut dir_page, directory_page_id);
            let mut dir = DirectoryMut::new(&mut dir_page);
            dir.set_bucket_page_id(0, bucket_page_id);
            dir.set_local_depth(0, 0);
        }

        buffer_pool.unpin_page(bucket_page_id, true)?;
        buffer_pool.unpin_page(directory_page_id, true)?;

        Ok(Self {
            buffer_pool,
            directory_page_id,
            table_latch: RwLock::new(()),
            hasher,
            _marker: PhantomData,
        })
    }

    fn hash(&self, key: &K) -> u32 {
        self.hasher.hash_key(key)
    }

    /// Every value stored under `key`
    pub fn get_value(&self, key: &K) -> Result<Vec<V>, HashTableError> {
        let _table = self.table_latch.read();

        let dir_ptr = self.buffer_pool.fetch_page(self.directory_page_id)?;
        let bucket_page_id = {
            let dir_page = dir_ptr.read();
            let dir = DirectoryRef::new(&dir_page);
            dir.bucket_page_id((self.hash(key) & dir.global_depth_mask()) as usize)
        };

        let bucket_ptr = self.buffer_pool.fetch_page(bucket_page_id)?;
        let values = {
            let bucket_page = bucket_ptr.read();
            BucketRef::<K, V>::new(&bucket_page).get_value(key)
        };

        self.buffer_pool.unpin_page(bucket_page_id, false)?;
        self.buffer_pool.unpin_page(self.directory_page_id, false)?;
        Ok(values)
    }

    /// Insert a pair, splitting the target bucket (and doubling the
    /// directory) as needed. Exact duplicates are rejected.
    pub fn insert(&self, key: &K, value: &V) -> Result<(), HashTableError> {
        // optimistic path: shared table latch, write latch on the bucket
        {
            let _table = self.table_latch.read();

            let dir_ptr = self.buffer_pool.fetch_page(self.directory_page_id)?;
            let bucket_page_id = {
                let dir_page = dir_ptr.read();
                let dir = DirectoryRef::new(&dir_page);
                dir.bucket_page_id((self.hash(key) & dir.global_depth_mask()) as usize)
            };

            let bucket_ptr = self.buffer_pool.fetch_page(bucket_page_id)?;
            let outcome = {
                let mut bucket_page = bucket_ptr.write();
                let mut bucket = BucketMut::<K, V>::new(&mut bucket_page);
                if bucket.is_full() {
                    None
                } else {
                    Some(bucket.insert(key, value))
                }
            };

            match outcome {
                Some(result) => {
                    self.buffer_pool.unpin_page(bucket_page_id, result.is_ok())?;
                    self.buffer_pool.unpin_page(self.directory_page_id, false)?;
                    return result.map_err(|e| match e {
                        PageError::DuplicateRecord => HashTableError::DuplicateKey,
                        _ => HashTableError::BucketFull,
                    });
                }
                None => {
                    self.buffer_pool.unpin_page(bucket_page_id, false)?;
                    self.buffer_pool.unpin_page(self.directory_page_id, false)?;
                }
            }
        }

        self.split_insert(key, value)
    }

    /// Pessimistic insert path: exclusive table latch held across the
    /// whole structural change. Loops because one split may not separate
    /// the colliding keys.
    fn split_insert(&self, key: &K, value: &V) -> Result<(), HashTableError> {
        let _table = self.table_latch.write();

        let dir_ptr = self.buffer_pool.fetch_page(self.directory_page_id)?;
        let result = (|| {
            loop {
                let mut dir_page = dir_ptr.write();
                let mut dir = DirectoryMut::new(&mut dir_page);

                let hash = self.hash(key);
                let bucket_idx = (hash & dir.global_depth_mask()) as usize;
                let bucket_page_id = dir.bucket_page_id(bucket_idx);

                let bucket_ptr = self.buffer_pool.fetch_page(bucket_page_id)?;
                let full = {
                    let bucket_page = bucket_ptr.read();
                    BucketRef::<K, V>::new(&bucket_page).is_full()
                };

                if !full {
                    let insert_result = {
                        let mut bucket_page = bucket_ptr.write();
                        BucketMut::<K, V>::new(&mut bucket_page).insert(key, value)
                    };
                    self.buffer_pool
                        .unpin_page(bucket_page_id, insert_result.is_ok())?;
                    return insert_result.map_err(|e| match e {
                        PageError::DuplicateRecord => HashTableError::DuplicateKey,
                        _ => HashTableError::BucketFull,
                    });
                }

                let local_depth = dir.local_depth(bucket_idx);
                if local_depth == dir.global_depth() {
                    if dir.global_depth() == MAX_DEPTH {
                        self.buffer_pool.unpin_page(bucket_page_id, false)?;
                        log::warn!(
                            "bucket split rejected: directory already at max depth {}",
                            MAX_DEPTH
                        );
                        return Err(HashTableError::BucketFull);
                    }
                    // double the directory, mirroring every slot into its image
                    let old_size = dir.size();
                    dir.incr_global_depth();
                    for i in 0..old_size {
                        let image = i | old_size;
                        dir.set_bucket_page_id(image, dir.bucket_page_id(i));
                        dir.set_local_depth(image, dir.local_depth(i));
                    }
                    log::debug!("directory doubled to global depth {}", dir.global_depth());
                }

                let (new_page_id, new_ptr) = match self.buffer_pool.new_page() {
                    Ok(pair) => pair,
                    Err(e) => {
                        // a failed allocation leaves the directory intact
                        self.buffer_pool.unpin_page(bucket_page_id, false)?;
                        return Err(e.into());
                    }
                };

                // redirect every alias whose distinguishing bit is set,
                // bumping the depth of both halves
                let image_bit = 1usize << local_depth;
                for i in 0..dir.size() {
                    if dir.bucket_page_id(i) == bucket_page_id {
                        dir.incr_local_depth(i);
                        if i & image_bit != 0 {
                            dir.set_bucket_page_id(i, new_page_id);
                        }
                    }
                }
                log::debug!(
                    "split bucket page {} into new page {} at depth {}",
                    bucket_page_id,
                    new_page_id,
                    local_depth + 1
                );

                // rehash: entries whose hash selects the image move over
                {
                    let mut bucket_page = bucket_ptr.write();
                    let mut new_page = new_ptr.write();
                    let mut old_bucket = BucketMut::<K, V>::new(&mut bucket_page);
                    let mut new_bucket = BucketMut::<K, V>::new(&mut new_page);
                    for slot in 0..old_bucket.capacity() {
                        if !old_bucket.is_readable(slot) {
                            continue;
                        }
                        let slot_key = old_bucket.key_at(slot);
                        if self.hash(&slot_key) as usize & image_bit != 0 {
                            let slot_value = old_bucket.value_at(slot);
                            old_bucket.remove_at(slot);
                            // a fresh bucket cannot reject a rehashed entry
                            let _ = new_bucket.insert(&slot_key, &slot_value);
                        }
                    }
                }

                self.buffer_pool.unpin_page(bucket_page_id, true)?;
                self.buffer_pool.unpin_page(new_page_id, true)?;
                // retry: the loop re-resolves the target bucket under the
                // updated directory
            }
        })();

        self.buffer_pool.unpin_page(self.directory_page_id, true)?;
        result
    }

    /// Remove an exact pair. An emptied bucket is merged into its split
    /// image and the directory shrinks while it can.
    pub fn remove(&self, key: &K, value: &V) -> Result<bool, HashTableError> {
        let emptied = {
            let _table = self.table_latch.read();

            let dir_ptr = self.buffer_pool.fetch_page(self.directory_page_id)?;
            let bucket_page_id = {
                let dir_page = dir_ptr.read();
                let dir = DirectoryRef::new(&dir_page);
                dir.bucket_page_id((self.hash(key) & dir.global_depth_mask()) as usize)
            };

            let bucket_ptr = self.buffer_pool.fetch_page(bucket_page_id)?;
            let (removed, empty) = {
                let mut bucket_page = bucket_ptr.write();
                let mut bucket = BucketMut::<K, V>::new(&mut bucket_page);
                let removed = bucket.remove(key, value);
                (removed, removed && bucket.is_empty())
            };

            self.buffer_pool.unpin_page(bucket_page_id, removed)?;
            self.buffer_pool.unpin_page(self.directory_page_id, false)?;

            if !removed {
                return Ok(false);
            }
            empty
        };

        if emptied {
            self.merge(key)?;
        }
        Ok(true)
    }

    /// Fold an empty bucket into its image, then shrink the directory
    /// while every bucket fits in half the slots
    fn merge(&self, key: &K) -> Result<(), HashTableError> {
        let _table = self.table_latch.write();

        let dir_ptr = self.buffer_pool.fetch_page(self.directory_page_id)?;
        let result = (|| {
            let mut dir_page = dir_ptr.write();
            let mut dir = DirectoryMut::new(&mut dir_page);

            let bucket_idx = (self.hash(key) & dir.global_depth_mask()) as usize;
            let victim_page_id = dir.bucket_page_id(bucket_idx);
            let image_idx = dir.image_index(bucket_idx);

            // the table latch was dropped between remove and merge, so
            // the bucket may have been refilled
            if !self.bucket_is_empty(victim_page_id)? {
                return Ok(());
            }

            if dir.do_merge(bucket_idx, image_idx) {
                log::debug!(
                    "merged empty bucket {} into image {}, freeing page {}",
                    bucket_idx,
                    image_idx,
                    victim_page_id
                );
                self.buffer_pool.delete_page(victim_page_id)?;
            } else {
                return Ok(());
            }

            while dir.can_shrink() {
                dir.decr_global_depth();
                log::debug!("directory shrank to global depth {}", dir.global_depth());
                for i in 0..dir.size() {
                    let page_id = dir.bucket_page_id(i);
                    if page_id == INVALID_PAGE_ID {
                        continue;
                    }
                    if self.bucket_is_empty(page_id)? {
                        let image = dir.image_index(i);
                        if dir.do_merge(i, image) {
                            self.buffer_pool.delete_page(page_id)?;
                        }
                    }
                }
            }
            Ok(())
        })();

        self.buffer_pool.unpin_page(self.directory_page_id, true)?;
        result
    }

    fn bucket_is_empty(&self, page_id: PageId) -> Result<bool, HashTableError> {
        let bucket_ptr = self.buffer_pool.fetch_page(page_id)?;
        let empty = {
            let bucket_page = bucket_ptr.read();
            BucketRef::<K, V>::new(&bucket_page).is_empty()
        };
        self.buffer_pool.unpin_page(page_id, false)?;
        Ok(empty)
    }

    /// Current global depth (test and diagnostic use)
    pub fn global_depth(&self) -> Result<u32, HashTableError> {
        let _table = self.table_latch.read();
        let dir_ptr = self.buffer_pool.fetch_page(self.directory_page_id)?;
        let depth = {
            let dir_page = dir_ptr.read();
            DirectoryRef::new(&dir_page).global_depth()
        };
        self.buffer_pool.unpin_page(self.directory_page_id, false)?;
        Ok(depth)
    }

    /// Check the directory invariants, panicking on violation
    pub fn verify_integrity(&self) -> Result<(), HashTableError> {
        let _table = self.table_latch.read();
        let dir_ptr = self.buffer_pool.fetch_page(self.directory_page_id)?;
        {
            let dir_page = dir_ptr.read();
            DirectoryRef::new(&dir_page).verify_integrity();
        }
        self.buffer_pool.unpin_page(self.directory_page_id, false)?;
        Ok(())
    }
}
