use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};

use crate::common::types::{FrameId, Page, PageId, PagePtr, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LruReplacer;
use crate::storage::disk::DiskManager;

/// Per-frame bookkeeping. Page bytes live behind the frame's PagePtr; the
/// metadata here is only touched under the instance mutex.
struct FrameMeta {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

struct PoolInner {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    frames: Vec<FrameMeta>,
    next_page_id: PageId,
}

/// One buffer pool shard. An instance with index `i` out of `n` owns every
/// page id `p` with `p % n == i`, and allocates ids only from that residue
/// class.
///
/// Pin discipline: a page must not be read without a pin, nor written
/// without a pin and the page's write latch. Latches are acquired after
/// pinning and released before unpinning.
pub struct BufferPoolInstance {
    pool_size: usize,
    num_instances: usize,
    instance_index: usize,
    pages: Vec<PagePtr>,
    replacer: LruReplacer,
    inner: Mutex<PoolInner>,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolInstance {
    pub fn new(
        pool_size: usize,
        num_instances: usize,
        instance_index: usize,
        disk_manager: Arc<DiskManager>,
    ) -> Self {
        let mut pages = Vec::with_capacity(pool_size);
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            pages.push(Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID))));
            frames.push(FrameMeta {
                page_id: INVALID_PAGE_ID,
                pin_count: 0,
                is_dirty: false,
            });
            free_list.push_back(i as FrameId);
        }

        Self {
            pool_size,
            num_instances,
            instance_index,
            pages,
            replacer: LruReplacer::new(pool_size),
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
                frames,
                next_page_id: instance_index as PageId,
            }),
            disk_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch a page, pinning it. Reads from disk if the page is not
    /// resident. Fails with `BufferPoolFull` when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::PageNotFound(page_id));
        }

        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            inner.frames[frame_id as usize].pin_count += 1;
            self.replacer.pin(frame_id);
            return Ok(self.pages[frame_id as usize].clone());
        }

        let frame_id = self.evict_frame(&mut inner)?;

        {
            let mut page = self.pages[frame_id as usize].write();
            if let Err(e) = self.disk_manager.read_page(page_id, &mut page) {
                // keep the frame reusable instead of leaking it
                inner.free_list.push_back(frame_id);
                return Err(e.into());
            }
        }

        let meta = &mut inner.frames[frame_id as usize];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(self.pages[frame_id as usize].clone())
    }

    /// Allocate a fresh page id from this shard's residue class and install
    /// it zeroed, pinned once.
    pub fn new_page(&self) -> Result<(PageId, PagePtr), BufferPoolError> {
        let mut inner = self.inner.lock();

        let frame_id = self.evict_frame(&mut inner)?;

        let page_id = inner.next_page_id;
        inner.next_page_id += self.num_instances as PageId;

        {
            let mut page = self.pages[frame_id as usize].write();
            page.reset(page_id);
        }

        let meta = &mut inner.frames[frame_id as usize];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = true;
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok((page_id, self.pages[frame_id as usize].clone()))
    }

    /// Drop one pin. When the count reaches zero the frame becomes a
    /// replacement candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Err(BufferPoolError::PageNotFound(page_id)),
        };

        let meta = &mut inner.frames[frame_id as usize];
        meta.pin_count = meta.pin_count.saturating_sub(1);
        meta.is_dirty |= is_dirty;

        if meta.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }

        Ok(())
    }

    /// Write a resident page to disk unconditionally and clear its dirty
    /// flag.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();

        let frame_id = match inner.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Err(BufferPoolError::PageNotFound(page_id)),
        };

        {
            let page = self.pages[frame_id as usize].read();
            self.disk_manager.write_page(&page)?;
        }
        inner.frames[frame_id as usize].is_dirty = false;

        Ok(())
    }

    /// Flush every resident page of this instance
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let page_ids: Vec<PageId> = {
            let inner = self.inner.lock();
            inner.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            // a page may have been evicted since the snapshot
            match self.flush_page(page_id) {
                Ok(()) | Err(BufferPoolError::PageNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Evict a page from the pool and return its id to the disk manager.
    /// Fails with `PagePinned` while anyone still holds a pin.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let meta = &mut inner.frames[frame_id as usize];
            if meta.pin_count > 0 {
                return Err(BufferPoolError::PagePinned(page_id));
            }
            meta.page_id = INVALID_PAGE_ID;
            meta.is_dirty = false;
            inner.page_table.remove(&page_id);
            self.replacer.pin(frame_id);
            inner.free_list.push_back(frame_id);
        }

        self.disk_manager.deallocate_page(page_id);
        Ok(())
    }

    /// Obtain a usable frame: free list first, then an LRU victim. A dirty
    /// victim is written back before its frame is reused.
    fn evict_frame(&self, inner: &mut PoolInner) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let victim_id = self.replacer.victim().ok_or(BufferPoolError::BufferPoolFull)?;
        let meta = &inner.frames[victim_id as usize];
        debug_assert_eq!(meta.pin_count, 0);

        if meta.is_dirty {
            let page = self.pages[victim_id as usize].read();
            log::debug!("writing back dirty page {} before reuse", page.page_id);
            if let Err(e) = self.disk_manager.write_page(&page) {
                self.replacer.unpin(victim_id);
                return Err(e.into());
            }
        }
        if meta.page_id != INVALID_PAGE_ID {
            let old_id = meta.page_id;
            inner.page_table.remove(&old_id);
        }

        Ok(victim_id)
    }
}
