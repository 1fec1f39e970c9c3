//! Hash-indexed LRU chain over the frame arena
//!
//! Every linked frame is a member of two doubly-linked lists at once:
//! - a hash chain selected by `page % HASH_BUCKETS`, for lookup by page number
//! - the global recency list, least-recently-used at the head and
//!   most-recently-used at the tail
//!
//! Both memberships are changed together by [`FrameTable::link`] and
//! [`FrameTable::unlink`], so a frame is either in both lists or in neither.

use crate::core::error::{PoolError, Result};
use crate::core::frame::{Frame, FrameId, Links};
use crate::core::PageNo;

/// Number of hash chains
pub const HASH_BUCKETS: usize = 128;

fn bucket_of(page: PageNo) -> usize {
    page as usize % HASH_BUCKETS
}

/// Arena of frames plus the hash chains and LRU list threaded through it
#[derive(Debug)]
pub(crate) struct FrameTable {
    frames: Vec<Frame>,
    buckets: Vec<Option<FrameId>>,
    /// Least recently used
    lru_head: Option<FrameId>,
    /// Most recently used
    lru_tail: Option<FrameId>,
    linked: usize,
}

impl FrameTable {
    pub fn new() -> Self {
        FrameTable {
            frames: Vec::new(),
            buckets: vec![None; HASH_BUCKETS],
            lru_head: None,
            lru_tail: None,
            linked: 0,
        }
    }

    /// Add a frame to the arena (unlinked)
    pub fn push(&mut self, frame: Frame) -> Result<FrameId> {
        self.frames
            .try_reserve(1)
            .map_err(|_| PoolError::OutOfMemory { what: "frame slot" })?;
        let id = FrameId(self.frames.len());
        self.frames.push(frame);
        Ok(id)
    }

    /// Total frames allocated, linked or not
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Frames currently present in the lists
    #[cfg(test)]
    pub fn linked_len(&self) -> usize {
        self.linked
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.index())
    }

    pub(crate) fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.index()]
    }

    pub(crate) fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.index()]
    }

    /// Find the linked frame holding `page`
    pub fn lookup(&self, page: PageNo) -> Option<FrameId> {
        let mut cursor = self.buckets[bucket_of(page)];
        while let Some(id) = cursor {
            let frame = self.frame(id);
            if frame.page == page {
                return Some(id);
            }
            cursor = frame.hash.next;
        }
        None
    }

    /// Insert at the head of its hash chain and the tail of the LRU list
    pub fn link(&mut self, id: FrameId) {
        debug_assert!(!self.frame(id).linked, "frame {:?} already linked", id);
        let bucket = bucket_of(self.frame(id).page);

        let old_head = self.buckets[bucket];
        if let Some(head) = old_head {
            self.frame_mut(head).hash.prev = Some(id);
        }
        self.buckets[bucket] = Some(id);

        let old_tail = self.lru_tail;
        if let Some(tail) = old_tail {
            self.frame_mut(tail).lru.next = Some(id);
        } else {
            self.lru_head = Some(id);
        }
        self.lru_tail = Some(id);

        let frame = self.frame_mut(id);
        frame.hash = Links {
            prev: None,
            next: old_head,
        };
        frame.lru = Links {
            prev: old_tail,
            next: None,
        };
        frame.linked = true;
        self.linked += 1;
    }

    /// Remove from both lists; no-op for an unlinked frame
    pub fn unlink(&mut self, id: FrameId) {
        if !self.frame(id).linked {
            return;
        }
        let (page, hash, lru) = {
            let frame = self.frame(id);
            (frame.page, frame.hash, frame.lru)
        };

        match hash.prev {
            Some(prev) => self.frame_mut(prev).hash.next = hash.next,
            None => self.buckets[bucket_of(page)] = hash.next,
        }
        if let Some(next) = hash.next {
            self.frame_mut(next).hash.prev = hash.prev;
        }

        match lru.prev {
            Some(prev) => self.frame_mut(prev).lru.next = lru.next,
            None => self.lru_head = lru.next,
        }
        match lru.next {
            Some(next) => self.frame_mut(next).lru.prev = lru.prev,
            None => self.lru_tail = lru.prev,
        }

        let frame = self.frame_mut(id);
        frame.hash = Links::default();
        frame.lru = Links::default();
        frame.linked = false;
        self.linked -= 1;
    }

    /// Recency bump: hash-chain head and LRU tail
    pub fn touch(&mut self, id: FrameId) {
        self.unlink(id);
        self.link(id);
    }

    /// Least-recently-used unpinned frame
    pub fn find_victim(&self) -> Option<FrameId> {
        self.lru_iter().find(|&id| !self.frame(id).pinned)
    }

    /// Linked frames from least to most recently used
    pub fn lru_iter(&self) -> LruIter<'_> {
        LruIter {
            table: self,
            cursor: self.lru_head,
        }
    }

    /// Snapshot of the LRU order, for walks that mutate frames
    pub fn lru_order(&self) -> Vec<FrameId> {
        self.lru_iter().collect()
    }
}

/// Iterator over linked frames in LRU order
pub(crate) struct LruIter<'a> {
    table: &'a FrameTable,
    cursor: Option<FrameId>,
}

impl Iterator for LruIter<'_> {
    type Item = FrameId;

    fn next(&mut self) -> Option<FrameId> {
        let id = self.cursor?;
        self.cursor = self.table.frame(id).lru.next;
        Some(id)
    }
}
