//! Cached page frames
//!
//! A frame is the in-memory copy of one page plus its pin/dirty bookkeeping.
//! Frames live in the [`FrameTable`](crate::core::chain::FrameTable) arena and
//! are addressed by [`FrameId`]; the hash-chain and LRU links are stored in the
//! frame itself so membership in both lists moves together.

use crate::core::error::{PoolError, Result};
use crate::core::PageNo;

/// Stable index of a frame inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub(crate) usize);

impl FrameId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Doubly-linked list links threaded through the arena
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Links {
    pub prev: Option<FrameId>,
    pub next: Option<FrameId>,
}

/// One cached page
#[derive(Debug)]
pub(crate) struct Frame {
    /// Page currently held (meaningless while unlinked)
    pub page: PageNo,
    /// Checked out by a caller; never evicted while set
    pub pinned: bool,
    /// Modified since the last write-back
    pub dirty: bool,
    /// Exactly `page_size` bytes
    pub data: Box<[u8]>,
    /// Hash-chain membership
    pub hash: Links,
    /// LRU membership
    pub lru: Links,
    /// Present in both lists
    pub linked: bool,
}

impl Frame {
    /// Allocate a zeroed frame, reporting allocation failure instead of aborting
    pub fn alloc(page_size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(page_size)
            .map_err(|_| PoolError::OutOfMemory { what: "page frame" })?;
        data.resize(page_size, 0);

        Ok(Frame {
            page: 0,
            pinned: false,
            dirty: false,
            data: data.into_boxed_slice(),
            hash: Links::default(),
            lru: Links::default(),
            linked: false,
        })
    }

    /// Reset bookkeeping for a new occupant, keeping the buffer
    pub fn reassign(&mut self, page: PageNo) {
        self.page = page;
        self.pinned = true;
        self.dirty = false;
    }

    /// Clear the payload
    pub fn zero(&mut self) {
        self.data.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed_and_unlinked() {
        let frame = Frame::alloc(512).unwrap();
        assert_eq!(frame.data.len(), 512);
        assert!(frame.data.iter().all(|&b| b == 0));
        assert!(!frame.pinned);
        assert!(!frame.dirty);
        assert!(!frame.linked);
    }

    #[test]
    fn test_reassign_pins_and_cleans() {
        let mut frame = Frame::alloc(16).unwrap();
        frame.dirty = true;
        frame.data[3] = 9;

        frame.reassign(42);
        assert_eq!(frame.page, 42);
        assert!(frame.pinned);
        assert!(!frame.dirty);
        // Payload is left for the caller to fill or zero
        assert_eq!(frame.data[3], 9);

        frame.zero();
        assert_eq!(frame.data[3], 0);
    }
}
