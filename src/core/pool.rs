//! Paged memory pool
//!
//! [`PagePool`] caches fixed-size pages of a [`BackingStore`]. Pages are
//! checked out pinned through [`PinnedPage`] tokens and checked back in with
//! [`PagePool::release`], optionally dirty. Dirty pages reach the store when
//! they are evicted or when [`PagePool::sync`] / [`PagePool::sync_page`] runs;
//! [`PagePool::close`] never flushes.
//!
//! The final page of the file may be shorter than the page size. Reads and
//! writes of that page move exactly `last_page_size` bytes, so syncing never
//! pads the file out to a page boundary.

use crate::core::chain::FrameTable;
use crate::core::config::PoolConfig;
use crate::core::error::{PoolError, Result};
use crate::core::filter::{BoxedFilter, PageFilter};
use crate::core::frame::{Frame, FrameId};
use crate::core::history::{ReferenceHistory, ReferenceRecord, ReferenceState};
use crate::core::io::{self, BackingStore};
use crate::core::stats::{FrameSummary, PoolCounters, StatsReport};
use crate::core::{PageNo, MAX_PAGE_NUMBER};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A pool shared between threads behind one mutex covering every operation
pub type SharedPagePool<S> = Arc<Mutex<PagePool<S>>>;

/// Claim on a pinned page, returned by the acquire calls.
///
/// The page stays cached and unevictable until the token is handed back to
/// [`PagePool::release`].
#[must_use = "pinned pages must be released back to the pool"]
#[derive(Debug, PartialEq, Eq)]
pub struct PinnedPage {
    pool: u64,
    frame: FrameId,
    page: PageNo,
}

impl PinnedPage {
    /// Page number this token pins
    pub fn page_no(&self) -> PageNo {
        self.page
    }
}

/// Page-granular buffer cache over a seekable store
pub struct PagePool<S: BackingStore> {
    id: u64,
    store: S,
    page_size: u32,
    last_page_size: u32,
    page_count: PageNo,
    max_cache: u32,
    frames: FrameTable,
    /// Allocated frames left unlinked by a failed acquisition
    parked: Vec<FrameId>,
    history: ReferenceHistory,
    input_filter: Option<BoxedFilter>,
    output_filter: Option<BoxedFilter>,
    /// Output-filtered copy of the page being written
    scratch: Vec<u8>,
    counters: PoolCounters,
}

impl<S: BackingStore> PagePool<S> {
    /// Open a pool over `store`.
    ///
    /// A `page_size` of 0 uses the store's block size (or the default page size
    /// when the store has no metadata); a `max_cache` of 0 uses the default
    /// cache size.
    pub fn open(store: S, page_size: u32, max_cache: u32) -> Result<Self> {
        Self::with_config(store, PoolConfig::new(page_size, max_cache))
    }

    /// Open a pool from a [`PoolConfig`]
    pub fn with_config(mut store: S, config: PoolConfig) -> Result<Self> {
        let probe = io::probe(&mut store)?;
        let page_size = config.resolve_page_size(probe.block_size);
        let max_cache = config.resolve_max_cache();

        let size = u64::from(page_size);
        let remainder = probe.len % size;
        let pages = probe.len / size + u64::from(remainder != 0);
        let page_count = PageNo::try_from(pages)
            .ok()
            .filter(|&count| count <= MAX_PAGE_NUMBER)
            .ok_or(PoolError::FileTooLarge {
                len: probe.len,
                page_size,
            })?;
        let last_page_size = if remainder == 0 {
            page_size
        } else {
            remainder as u32
        };

        let history = ReferenceHistory::with_existing_pages(page_count)?;

        info!(
            "Opened page pool: {} pages of {} bytes (last page {} bytes), max cache {}",
            page_count, page_size, last_page_size, max_cache
        );

        Ok(PagePool {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            store,
            page_size,
            last_page_size,
            page_count,
            max_cache,
            frames: FrameTable::new(),
            parked: Vec::new(),
            history,
            input_filter: None,
            output_filter: None,
            scratch: Vec::new(),
            counters: PoolCounters::default(),
        })
    }

    /// Replace both filters; pages already cached are not re-filtered
    pub fn set_filters(&mut self, input: Option<BoxedFilter>, output: Option<BoxedFilter>) {
        self.input_filter = input;
        self.output_filter = output;
    }

    /// Hook run on every page read in from the store
    pub fn set_input_filter<F: PageFilter + 'static>(&mut self, filter: F) {
        self.input_filter = Some(Box::new(filter));
    }

    /// Hook run on every page right before it is written out
    pub fn set_output_filter<F: PageFilter + 'static>(&mut self, filter: F) {
        self.output_filter = Some(Box::new(filter));
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn last_page_size(&self) -> u32 {
        self.last_page_size
    }

    /// Number of addressable pages; valid page numbers are `0..page_count`
    pub fn page_count(&self) -> PageNo {
        self.page_count
    }

    pub fn max_cache(&self) -> u32 {
        self.max_cache
    }

    /// Frames currently allocated; may exceed `max_cache` when all are pinned
    pub fn cached(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bytes of `page` that move between cache and store
    pub fn io_len(&self, page: PageNo) -> usize {
        if page.checked_add(1) == Some(self.page_count) {
            self.last_page_size as usize
        } else {
            self.page_size as usize
        }
    }

    /// Whether `page` is in the cache right now
    pub fn is_cached(&self, page: PageNo) -> bool {
        self.frames.lookup(page).is_some()
    }

    /// Dirty flag of a cached page
    pub fn is_dirty(&self, page: PageNo) -> Option<bool> {
        self.frames
            .lookup(page)
            .map(|id| self.frames.frame(id).dirty)
    }

    /// Reference-history entry for `page`, if it was ever touched
    pub fn reference(&self, page: PageNo) -> Option<ReferenceRecord> {
        self.history.get(page).copied()
    }

    /// Get a fresh pinned page.
    ///
    /// Without `extend` the page is appended at `page_count`; `page` and
    /// `last_page_size` are ignored and the pool's last page size is left as
    /// is. With `extend` the page is created at `page`, which must not be
    /// below the current page count, and a `last_page_size` other than the
    /// page size becomes the size of the new final page. Pages skipped over
    /// are never read from disk.
    ///
    /// # Panics
    ///
    /// Panics when the page count would pass [`MAX_PAGE_NUMBER`]; continuing
    /// would wrap page addressing.
    pub fn acquire_new(
        &mut self,
        page: PageNo,
        last_page_size: u32,
        extend: bool,
    ) -> Result<PinnedPage> {
        let target = if extend {
            if last_page_size == 0 || last_page_size > self.page_size {
                return Err(PoolError::InvalidPageSize(last_page_size));
            }
            if page < self.page_count {
                return Err(PoolError::InvalidExtend {
                    page,
                    page_count: self.page_count,
                });
            }
            if page >= MAX_PAGE_NUMBER {
                page_overflow(page);
            }
            page
        } else {
            if self.page_count >= MAX_PAGE_NUMBER {
                page_overflow(self.page_count);
            }
            self.page_count
        };

        self.counters.news += 1;
        let id = self.obtain_frame()?;
        if let Err(err) = self.history.touch_or_insert(target) {
            self.parked.push(id);
            return Err(err);
        }

        self.page_count = target + 1;
        // An odd size marks a short final page; appends keep the current one
        if extend && last_page_size != self.page_size {
            self.last_page_size = last_page_size;
        }

        let frame = self.frames.frame_mut(id);
        frame.reassign(target);
        frame.zero();
        self.frames.link(id);

        debug!(
            "New page {} (page count {}, last page {} bytes)",
            target, self.page_count, self.last_page_size
        );
        Ok(self.token(id, target))
    }

    /// Append a page at the end of the file
    pub fn append_page(&mut self) -> Result<PinnedPage> {
        self.acquire_new(0, self.page_size, false)
    }

    /// Create page `page` as the new final page, `last_page_size` bytes long
    pub fn extend_to(&mut self, page: PageNo, last_page_size: u32) -> Result<PinnedPage> {
        self.acquire_new(page, last_page_size, true)
    }

    /// Get page `page` pinned, reading it from the store on a cache miss
    pub fn acquire_existing(&mut self, page: PageNo) -> Result<PinnedPage> {
        self.check_range(page)?;
        self.counters.gets += 1;

        if let Some(id) = self.lookup(page) {
            if self.frames.frame(id).pinned {
                return Err(PoolError::PagePinned(page));
            }
            self.frames.touch(id);
            self.frames.frame_mut(id).pinned = true;
            self.history.touch(page);
            return Ok(self.token(id, page));
        }

        let id = self.obtain_frame()?;
        let len = self.io_len(page);

        match self.history.get(page).map(|record| record.state) {
            // Extend gap, or created in memory and evicted clean: the store
            // holds nothing for this page
            None | Some(ReferenceState::NotOnDisk) => {
                if let Err(err) = self.history.touch_or_insert(page) {
                    self.parked.push(id);
                    return Err(err);
                }
                self.frames.frame_mut(id).zero();
                debug!("Page {} never written, skipping read", page);
            }
            Some(state) => {
                self.history.mark(page, ReferenceState::Reading);
                self.counters.reads += 1;
                let offset = self.offset(page);
                let frame = self.frames.frame_mut(id);
                let read = io::read_page(&mut self.store, page, offset, &mut frame.data[..len]);
                self.history.restore(page, state);
                if let Err(err) = read {
                    self.parked.push(id);
                    return Err(err);
                }
                frame.data[len..].fill(0);
            }
        }

        let frame = self.frames.frame_mut(id);
        frame.reassign(page);
        if let Some(filter) = self.input_filter.as_mut() {
            filter.apply(page, &mut frame.data[..len]);
        }
        self.frames.link(id);

        debug!("Read page {} ({} bytes)", page, len);
        Ok(self.token(id, page))
    }

    /// Page bytes behind a token (the full `page_size` buffer)
    pub fn page(&self, pinned: &PinnedPage) -> Result<&[u8]> {
        let id = self.resolve(pinned)?;
        Ok(&self.frames.frame(id).data[..])
    }

    /// Mutable page bytes behind a token.
    ///
    /// Only the first [`io_len`](Self::io_len) bytes reach the store.
    pub fn page_mut(&mut self, pinned: &PinnedPage) -> Result<&mut [u8]> {
        let id = self.resolve(pinned)?;
        Ok(&mut self.frames.frame_mut(id).data[..])
    }

    /// Unpin a page, marking it dirty if it was modified
    pub fn release(&mut self, pinned: PinnedPage, dirty: bool) -> Result<()> {
        let id = self.resolve(&pinned)?;
        self.counters.puts += 1;

        let frame = self.frames.frame_mut(id);
        frame.pinned = false;
        if dirty {
            frame.dirty = true;
            self.history.mark(pinned.page, ReferenceState::Dirty);
        }
        Ok(())
    }

    /// Write every dirty page, then flush the store to durable storage.
    ///
    /// Stops at the first failure; pages written before it stay written.
    pub fn sync(&mut self) -> Result<()> {
        let mut written = 0usize;
        for id in self.frames.lru_order() {
            if self.frames.frame(id).dirty {
                self.write_frame(id)?;
                written += 1;
            }
        }
        self.store.sync_data()?;

        debug!("Synced pool: {} dirty pages written", written);
        Ok(())
    }

    /// Write one cached page if it is dirty.
    ///
    /// Fails with [`PoolError::PageNotCached`] for pages not in the cache.
    pub fn sync_page(&mut self, page: PageNo) -> Result<()> {
        self.check_range(page)?;
        let id = self.lookup(page).ok_or(PoolError::PageNotCached(page))?;
        if !self.frames.frame(id).dirty {
            return Ok(());
        }
        self.write_frame(id)
    }

    /// Diagnostic snapshot
    pub fn stats(&self) -> StatsReport {
        let mut counters = self.counters;
        counters.list_hits = self.history.list_hits;
        counters.list_allocs = self.history.list_allocs;

        let frames = self
            .frames
            .lru_iter()
            .map(|id| {
                let frame = self.frames.frame(id);
                FrameSummary {
                    page: frame.page,
                    dirty: frame.dirty,
                    pinned: frame.pinned,
                }
            })
            .collect();

        let frame_bytes = std::mem::size_of::<Frame>() + self.page_size as usize;
        let memory_bytes = std::mem::size_of::<Self>()
            + self.frames.len() * frame_bytes
            + self.history.len() * std::mem::size_of::<ReferenceRecord>();

        StatsReport {
            page_count: self.page_count,
            page_size: self.page_size,
            last_page_size: self.last_page_size,
            cached: self.cached(),
            max_cache: self.max_cache,
            counters,
            frames,
            references: self.history.sorted(),
            memory_bytes: memory_bytes as u64,
        }
    }

    /// Drop every frame and reference record and hand back the store.
    ///
    /// Dirty pages are discarded: call [`sync`](Self::sync) first to keep them.
    pub fn close(self) -> S {
        let dirty = self
            .frames
            .lru_iter()
            .filter(|&id| self.frames.frame(id).dirty)
            .count();
        if dirty > 0 {
            warn!("Closing page pool with {} unsynced dirty pages", dirty);
        }
        info!(
            "Closed page pool: {} pages, {} frames released",
            self.page_count,
            self.frames.len()
        );
        self.store
    }

    /// Wrap the pool for use from several threads
    pub fn into_shared(self) -> SharedPagePool<S> {
        Arc::new(Mutex::new(self))
    }

    fn token(&self, frame: FrameId, page: PageNo) -> PinnedPage {
        PinnedPage {
            pool: self.id,
            frame,
            page,
        }
    }

    /// Map a token back to its frame, rejecting stale or foreign tokens
    fn resolve(&self, pinned: &PinnedPage) -> Result<FrameId> {
        let valid = pinned.pool == self.id
            && self.frames.get(pinned.frame).is_some_and(|frame| {
                frame.linked && frame.pinned && frame.page == pinned.page
            });
        if valid {
            Ok(pinned.frame)
        } else {
            Err(PoolError::ForeignPage(pinned.page))
        }
    }

    fn check_range(&self, page: PageNo) -> Result<()> {
        if page >= self.page_count {
            return Err(PoolError::PageOutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(())
    }

    fn offset(&self, page: PageNo) -> u64 {
        u64::from(page) * u64::from(self.page_size)
    }

    /// Hash lookup, counted in the hit/miss statistics
    fn lookup(&mut self, page: PageNo) -> Option<FrameId> {
        let found = self.frames.lookup(page);
        if found.is_some() {
            self.counters.cache_hits += 1;
        } else {
            self.counters.cache_misses += 1;
        }
        found
    }

    /// Get an unlinked frame: a parked one, a new one while under capacity,
    /// else the least recently used unpinned one (written back first if
    /// dirty). When every frame is pinned the cache grows past `max_cache`.
    fn obtain_frame(&mut self) -> Result<FrameId> {
        if let Some(id) = self.parked.pop() {
            return Ok(id);
        }
        if self.cached() < self.max_cache {
            return self.alloc_frame();
        }

        if let Some(victim) = self.frames.find_victim() {
            let page = self.frames.frame(victim).page;
            if self.frames.frame(victim).dirty {
                if let Err(err) = self.write_frame(victim) {
                    warn!("Write-back of page {} failed during eviction: {}", page, err);
                    return Err(err);
                }
            }
            self.counters.flushes += 1;
            self.frames.unlink(victim);
            debug!("Evicted page {}", page);
            return Ok(victim);
        }

        debug!(
            "All {} cached frames pinned, growing past max cache {}",
            self.frames.len(),
            self.max_cache
        );
        self.alloc_frame()
    }

    fn alloc_frame(&mut self) -> Result<FrameId> {
        let frame = Frame::alloc(self.page_size as usize)?;
        let id = self.frames.push(frame)?;
        self.counters.allocs += 1;
        Ok(id)
    }

    /// Write one frame; never unpins or unlinks it.
    ///
    /// The output filter runs on a copy, so the cached bytes stay in memory
    /// form whether or not the write succeeds.
    fn write_frame(&mut self, id: FrameId) -> Result<()> {
        let page = self.frames.frame(id).page;
        let len = self.io_len(page);
        let offset = self.offset(page);
        self.counters.writes += 1;

        let data = &self.frames.frame(id).data[..len];
        match self.output_filter.as_mut() {
            Some(filter) => {
                self.scratch.clear();
                self.scratch
                    .try_reserve(len)
                    .map_err(|_| PoolError::OutOfMemory {
                        what: "write-back buffer",
                    })?;
                self.scratch.extend_from_slice(data);
                filter.apply(page, &mut self.scratch);
                io::write_page(&mut self.store, offset, &self.scratch)?;
            }
            None => io::write_page(&mut self.store, offset, data)?,
        }
        self.frames.frame_mut(id).dirty = false;
        self.history.mark(page, ReferenceState::OnDisk);

        debug!("Wrote page {} ({} bytes at offset {})", page, len, offset);
        Ok(())
    }
}

impl<S: BackingStore> fmt::Debug for PagePool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagePool")
            .field("page_size", &self.page_size)
            .field("last_page_size", &self.last_page_size)
            .field("page_count", &self.page_count)
            .field("cached", &self.cached())
            .field("max_cache", &self.max_cache)
            .field("input_filter", &self.input_filter.is_some())
            .field("output_filter", &self.output_filter.is_some())
            .finish()
    }
}

fn page_overflow(page: PageNo) -> ! {
    error!("Page allocation overflow at page {}", page);
    panic!("page allocation overflow at page {}", page);
}
