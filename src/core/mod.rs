//! Page pool internals
//!
//! - [`error`] - Error types and their coarse [`error::ErrorKind`] classification
//! - [`io`] - [`io::BackingStore`] and verified positioned page I/O
//! - [`frame`] - Page frames and their arena handles
//! - [`chain`] - Hash chains and the LRU list threaded through the frame arena
//! - [`history`] - Record of every page number ever touched
//! - [`filter`] - Page-in / page-out hooks
//! - [`stats`] - Counters and diagnostic reports
//! - [`config`] - Open-time configuration
//! - [`pool`] - The [`pool::PagePool`] itself

pub mod chain;
pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod history;
pub mod io;
pub mod pool;
pub mod stats;

/// Page number; pages are numbered from 0 at file offset 0
pub type PageNo = u32;

/// Upper bound on the page count. Growing past it is a fatal error.
pub const MAX_PAGE_NUMBER: PageNo = PageNo::MAX;

pub use chain::HASH_BUCKETS;
pub use config::{PoolConfig, DEFAULT_MAX_CACHE, DEFAULT_PAGE_SIZE};
pub use error::{ErrorKind, PoolError, Result};
pub use filter::{BoxedFilter, PageFilter};
pub use history::{ReferenceRecord, ReferenceState};
pub use io::{BackingStore, StoreStat};
pub use pool::{PagePool, PinnedPage, SharedPagePool};
pub use stats::{FrameSummary, PoolCounters, StatsReport};
