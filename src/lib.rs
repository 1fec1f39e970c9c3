//! # mpool-rs - Paged Memory Pool
//!
//! `mpool-rs` caches fixed-size pages of a seekable file (or any
//! [`BackingStore`]) in memory:
//!
//! - **Pinned access**: pages are checked out with a [`PinnedPage`] token and
//!   cannot be evicted until the token is released
//! - **LRU write-back**: dirty pages reach the store on eviction or sync
//! - **Soft capacity**: when every cached page is pinned the cache grows
//! - **Short final page**: files need not be a multiple of the page size
//! - **Sparse extension**: pages can be created far past the end of the file
//!   without reading the gap
//! - **Filters**: hooks run on every page read in and written out
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mpool_rs::{PagePool, Result};
//! use std::fs::OpenOptions;
//!
//! # fn main() -> Result<()> {
//! let file = OpenOptions::new()
//!     .read(true)
//!     .write(true)
//!     .create(true)
//!     .open("data.pages")?;
//!
//! // 4 KiB pages, at most 64 cached
//! let mut pool = PagePool::open(file, 4096, 64)?;
//!
//! let page = pool.append_page()?;
//! pool.page_mut(&page)?[..5].copy_from_slice(b"hello");
//! pool.release(page, true)?;
//!
//! pool.sync()?;
//! pool.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Builder
//!
//! ```rust,no_run
//! use mpool_rs::{PagePoolBuilder, PageNo, Result};
//! use std::fs::File;
//!
//! # fn main() -> Result<()> {
//! let mut pool = PagePoolBuilder::new()
//!     .page_size(8192)
//!     .max_cache(16)
//!     .input_filter(|page: PageNo, bytes: &mut [u8]| {
//!         tracing::trace!("page {} in, {} bytes", page, bytes.len());
//!     })
//!     .open(File::options().read(true).write(true).open("data.pages")?)?;
//!
//! let page = pool.acquire_existing(0)?;
//! println!("first byte: {}", pool.page(&page)?[0]);
//! pool.release(page, false)?;
//! println!("{}", pool.stats());
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    config::{PoolConfig, DEFAULT_MAX_CACHE, DEFAULT_PAGE_SIZE},
    error::{ErrorKind, PoolError, Result},
    filter::{BoxedFilter, PageFilter},
    history::{ReferenceRecord, ReferenceState},
    io::{BackingStore, StoreStat},
    pool::{PagePool, PinnedPage, SharedPagePool},
    stats::{FrameSummary, PoolCounters, StatsReport},
    PageNo, HASH_BUCKETS, MAX_PAGE_NUMBER,
};

use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::debug;

/// Builder for customizing pool creation
///
/// # Example
///
/// ```rust,no_run
/// use mpool_rs::PagePoolBuilder;
///
/// let pool = PagePoolBuilder::new()
///     .page_size(4096)
///     .max_cache(32)
///     .open_path("data.pages")
///     .unwrap();
/// ```
pub struct PagePoolBuilder {
    config: PoolConfig,
    input: Option<BoxedFilter>,
    output: Option<BoxedFilter>,
}

impl PagePoolBuilder {
    /// Create a builder that picks the default page size and cache size
    pub fn new() -> Self {
        PagePoolBuilder {
            config: PoolConfig::default(),
            input: None,
            output: None,
        }
    }

    /// Start from a loaded configuration
    pub fn with_config(config: PoolConfig) -> Self {
        PagePoolBuilder {
            config,
            ..Self::new()
        }
    }

    /// Set the page size (0 selects the file's block size)
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Set the soft cap on cached pages
    pub fn max_cache(mut self, max_cache: u32) -> Self {
        self.config.max_cache = max_cache;
        self
    }

    /// Run `filter` on each page read from disk
    pub fn input_filter<F: PageFilter + 'static>(mut self, filter: F) -> Self {
        self.input = Some(Box::new(filter));
        self
    }

    /// Run `filter` on each page before it is written to disk
    pub fn output_filter<F: PageFilter + 'static>(mut self, filter: F) -> Self {
        self.output = Some(Box::new(filter));
        self
    }

    /// Open the pool over `store`
    pub fn open<S: BackingStore>(self, store: S) -> Result<PagePool<S>> {
        let mut pool = PagePool::with_config(store, self.config)?;
        if self.input.is_some() || self.output.is_some() {
            debug!(
                "Installing filters (input: {}, output: {})",
                self.input.is_some(),
                self.output.is_some()
            );
            pool.set_filters(self.input, self.output);
        }
        Ok(pool)
    }

    /// Open (creating if needed) the file at `path` read-write and pool it
    pub fn open_path<P: AsRef<Path>>(self, path: P) -> Result<PagePool<File>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        debug!("Opened backing file {}", path.as_ref().display());
        self.open(file)
    }
}

impl Default for PagePoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
