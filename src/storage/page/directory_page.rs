use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{Page, PageId, INVALID_PAGE_ID};

/// Maximum directory depth; the full directory must fit in one page
pub const MAX_DEPTH: u32 = 9;
/// Number of directory slots reserved on the page
pub const DIRECTORY_ARRAY_SIZE: usize = 1 << MAX_DEPTH;

// On-page layout, little-endian, packed:
//   0..4    page id of the directory page itself
//   4..8    reserved
//   8..12   global depth
//   12..    one byte of local depth per slot
//   524..   4-byte bucket page id per slot
const OFF_PAGE_ID: usize = 0;
const OFF_GLOBAL_DEPTH: usize = 8;
const OFF_LOCAL_DEPTHS: usize = 12;
const OFF_BUCKET_PAGE_IDS: usize = OFF_LOCAL_DEPTHS + DIRECTORY_ARRAY_SIZE;

fn read_global_depth(page: &Page) -> u32 {
    LittleEndian::read_u32(&page.data[OFF_GLOBAL_DEPTH..OFF_GLOBAL_DEPTH + 4])
}

fn read_local_depth(page: &Page, idx: usize) -> u32 {
    page.data[OFF_LOCAL_DEPTHS + idx] as u32
}

fn read_bucket_page_id(page: &Page, idx: usize) -> PageId {
    let off = OFF_BUCKET_PAGE_IDS + idx * 4;
    LittleEndian::read_u32(&page.data[off..off + 4])
}

/// Read-only view of an extendible-hash directory page
pub struct DirectoryRef<'a> {
    page: &'a Page,
}

impl<'a> DirectoryRef<'a> {
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    pub fn page_id(&self) -> PageId {
        LittleEndian::read_u32(&self.page.data[OFF_PAGE_ID..OFF_PAGE_ID + 4])
    }

    pub fn global_depth(&self) -> u32 {
        read_global_depth(self.page)
    }

    /// Number of active directory slots
    pub fn size(&self) -> usize {
        1 << self.global_depth()
    }

    pub fn global_depth_mask(&self) -> u32 {
        (1u32 << self.global_depth()) - 1
    }

    pub fn local_depth(&self, idx: usize) -> u32 {
        read_local_depth(self.page, idx)
    }

    pub fn bucket_page_id(&self, idx: usize) -> PageId {
        read_bucket_page_id(self.page, idx)
    }

    /// The split image of a slot: the slot whose key space merges with
    /// this one if its local depth decreased by one
    pub fn image_index(&self, idx: usize) -> usize {
        image_index_with_depth(idx, self.local_depth(idx))
    }

    /// The directory can halve when every active slot uses fewer bits
    /// than the global depth
    pub fn can_shrink(&self) -> bool {
        let global = self.global_depth();
        if global == 0 {
            return false;
        }
        (0..self.size()).all(|i| self.local_depth(i) < global)
    }

    /// Assert the directory invariants: every local depth is bounded by
    /// the global depth, and two slots share a bucket page exactly when
    /// they agree on their local-depth-many low bits.
    pub fn verify_integrity(&self) {
        let global = self.global_depth();
        let size = self.size();
        for i in 0..size {
            let ld = self.local_depth(i);
            assert!(
                ld <= global,
                "slot {} has local depth {} above global depth {}",
                i,
                ld,
                global
            );
        }
        for i in 0..size {
            for j in (i + 1)..size {
                let same_page = self.bucket_page_id(i) == self.bucket_page_id(j);
                let ld_i = self.local_depth(i);
                let same_class = ld_i == self.local_depth(j)
                    && (i as u32 & low_mask(ld_i)) == (j as u32 & low_mask(ld_i));
                assert_eq!(
                    same_page, same_class,
                    "slots {} and {} disagree on page sharing",
                    i, j
                );
            }
        }
    }
}

/// Mutable view of an extendible-hash directory page
pub struct DirectoryMut<'a> {
    page: &'a mut Page,
}

impl<'a> DirectoryMut<'a> {
    pub fn new(page: &'a mut Page) -> Self {
        Self { page }
    }

    /// Format a fresh directory: depth zero, every slot unmapped
    pub fn init(page: &mut Page, page_id: PageId) {
        page.data[..OFF_BUCKET_PAGE_IDS + DIRECTORY_ARRAY_SIZE * 4].fill(0);
        LittleEndian::write_u32(&mut page.data[OFF_PAGE_ID..OFF_PAGE_ID + 4], page_id);
        let mut view = DirectoryMut::new(page);
        for i in 0..DIRECTORY_ARRAY_SIZE {
            view.set_bucket_page_id(i, INVALID_PAGE_ID);
        }
    }

    pub fn global_depth(&self) -> u32 {
        read_global_depth(&*self.page)
    }

    pub fn size(&self) -> usize {
        1 << self.global_depth()
    }

    pub fn global_depth_mask(&self) -> u32 {
        (1u32 << self.global_depth()) - 1
    }

    pub fn local_depth(&self, idx: usize) -> u32 {
        read_local_depth(&*self.page, idx)
    }

    pub fn bucket_page_id(&self, idx: usize) -> PageId {
        read_bucket_page_id(&*self.page, idx)
    }

    pub fn image_index(&self, idx: usize) -> usize {
        image_index_with_depth(idx, self.local_depth(idx))
    }

    pub fn can_shrink(&self) -> bool {
        DirectoryRef::new(&*self.page).can_shrink()
    }

    pub fn set_global_depth(&mut self, depth: u32) {
        debug_assert!(depth <= MAX_DEPTH);
        LittleEndian::write_u32(&mut self.page.data[OFF_GLOBAL_DEPTH..OFF_GLOBAL_DEPTH + 4], depth);
    }

    pub fn incr_global_depth(&mut self) {
        let depth = self.global_depth();
        debug_assert!(depth < MAX_DEPTH);
        self.set_global_depth(depth + 1);
    }

    pub fn decr_global_depth(&mut self) {
        let depth = self.global_depth();
        debug_assert!(depth > 0);
        self.set_global_depth(depth - 1);
    }

    pub fn set_local_depth(&mut self, idx: usize, depth: u32) {
        debug_assert!(depth <= MAX_DEPTH);
        self.page.data[OFF_LOCAL_DEPTHS + idx] = depth as u8;
    }

    pub fn incr_local_depth(&mut self, idx: usize) {
        let depth = self.local_depth(idx);
        self.set_local_depth(idx, depth + 1);
    }

    pub fn set_bucket_page_id(&mut self, idx: usize, page_id: PageId) {
        let off = OFF_BUCKET_PAGE_IDS + idx * 4;
        LittleEndian::write_u32(&mut self.page.data[off..off + 4], page_id);
    }

    /// Fold the bucket at `idx` into its split image. Succeeds only when
    /// both sides use the same non-zero local depth and actually live on
    /// distinct pages. Every slot aliasing the victim page is redirected
    /// to the survivor and every survivor slot drops one depth bit, so
    /// the sharing invariant holds even below the global depth.
    pub fn do_merge(&mut self, idx: usize, image_idx: usize) -> bool {
        let depth = self.local_depth(idx);
        if depth == 0 || depth != self.local_depth(image_idx) {
            return false;
        }
        let victim = self.bucket_page_id(idx);
        let survivor = self.bucket_page_id(image_idx);
        if victim == survivor || victim == INVALID_PAGE_ID || survivor == INVALID_PAGE_ID {
            return false;
        }

        let size = self.size();
        for i in 0..size {
            if self.bucket_page_id(i) == victim {
                self.set_bucket_page_id(i, survivor);
            }
        }
        for i in 0..size {
            if self.bucket_page_id(i) == survivor {
                self.set_local_depth(i, depth - 1);
            }
        }
        true
    }
}

fn image_index_with_depth(idx: usize, local_depth: u32) -> usize {
    if local_depth == 0 {
        idx
    } else {
        idx ^ (1 << (local_depth - 1))
    }
}

fn low_mask(bits: u32) -> u32 {
    (1u32 << bits) - 1
}
