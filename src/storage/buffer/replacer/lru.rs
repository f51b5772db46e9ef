use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;

use crate::common::types::FrameId;

/// LRU (Least Recently Used) replacement policy over unpinned frames.
///
/// Only frames that are eligible for eviction live here; the buffer pool
/// keeps its own pin counts and reports a frame once its count drops to
/// zero. The map is ordered oldest-first, so a victim is simply the front
/// entry.
pub struct LruReplacer {
    inner: Mutex<LruInner>,
}

struct LruInner {
    num_pages: usize,
    // insertion-ordered; front = least recently unpinned
    frames: LinkedHashMap<FrameId, ()>,
}

impl LruReplacer {
    pub fn new(num_pages: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                num_pages,
                frames: LinkedHashMap::new(),
            }),
        }
    }

    /// Remove and return the least recently used frame, if any
    pub fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        inner.frames.pop_front().map(|(frame_id, _)| frame_id)
    }

    /// Make a frame ineligible for victimization. Idempotent.
    pub fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        inner.frames.remove(&frame_id);
    }

    /// Make a frame eligible for victimization. A frame that is already
    /// tracked keeps its position; otherwise the oldest entries are evicted
    /// until there is room, and the frame enters as most recent.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if inner.frames.contains_key(&frame_id) {
            return;
        }
        while inner.frames.len() >= inner.num_pages {
            inner.frames.pop_front();
        }
        inner.frames.insert(frame_id, ());
    }

    pub fn size(&self) -> usize {
        self.inner.lock().frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_victim_order_is_unpin_order() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(3);
        replacer.unpin(1);
        replacer.unpin(2);

        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_pin_removes_frame() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(1);
        // pinning an untracked frame is a no-op
        replacer.pin(7);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.victim(), Some(2));
    }

    #[test]
    fn test_unpin_already_present_keeps_position() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(1);

        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
    }

    #[test]
    fn test_unpin_at_capacity_drops_oldest() {
        let replacer = LruReplacer::new(2);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
    }
}
