use std::sync::Arc;
use parking_lot::Mutex;

use crate::common::config::EngineConfig;
use crate::common::types::{PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::instance::BufferPoolInstance;
use crate::storage::disk::DiskManager;

/// A buffer pool sharded over `num_instances` independent instances.
/// Page id `p` is owned by instance `p % num_instances`; allocations are
/// spread round-robin across instances.
pub struct ParallelBufferPool {
    instances: Vec<BufferPoolInstance>,
    next_instance: Mutex<usize>,
}

impl ParallelBufferPool {
    pub fn new(num_instances: usize, pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        assert!(num_instances > 0, "at least one buffer pool instance");
        let instances = (0..num_instances)
            .map(|i| BufferPoolInstance::new(pool_size, num_instances, i, disk_manager.clone()))
            .collect();

        Self {
            instances,
            next_instance: Mutex::new(0),
        }
    }

    /// Build a pool from engine configuration
    pub fn with_config(config: &EngineConfig, disk_manager: Arc<DiskManager>) -> Self {
        Self::new(config.num_instances, config.pool_size, disk_manager)
    }

    /// Total frame count across all instances
    pub fn pool_size(&self) -> usize {
        self.instances.iter().map(|i| i.pool_size()).sum()
    }

    fn instance_for(&self, page_id: PageId) -> &BufferPoolInstance {
        &self.instances[page_id as usize % self.instances.len()]
    }

    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).flush_page(page_id)
    }

    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).delete_page(page_id)
    }

    /// Allocate a new page, trying each instance once starting from a
    /// round-robin index. Fails only when every instance is out of frames.
    pub fn new_page(&self) -> Result<(PageId, PagePtr), BufferPoolError> {
        let mut start = self.next_instance.lock();
        let n = self.instances.len();
        let first = *start;
        *start = (*start + 1) % n;

        for i in 0..n {
            match self.instances[(first + i) % n].new_page() {
                Ok(result) => return Ok(result),
                Err(BufferPoolError::BufferPoolFull) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(BufferPoolError::BufferPoolFull)
    }

    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        for instance in &self.instances {
            instance.flush_all_pages()?;
        }
        Ok(())
    }
}
