//! Pool statistics
//!
//! Counters are plain integers embedded in the pool and bumped on every
//! operation; [`StatsReport`] is a read-only snapshot built on demand.

use crate::core::history::ReferenceRecord;
use crate::core::PageNo;
use serde::Serialize;
use std::fmt;

/// Running operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolCounters {
    /// `acquire_existing` calls that passed validation
    pub gets: u64,
    /// `acquire_new` calls
    pub news: u64,
    /// `release` calls
    pub puts: u64,
    /// Frame buffers allocated
    pub allocs: u64,
    /// Frames evicted to make room
    pub flushes: u64,
    /// Pages read from the backing store
    pub reads: u64,
    /// Pages written to the backing store
    pub writes: u64,
    /// Hash lookups that found the page cached
    pub cache_hits: u64,
    /// Hash lookups that missed
    pub cache_misses: u64,
    /// Reference-history lookups that found a record
    pub list_hits: u64,
    /// Reference records created
    pub list_allocs: u64,
}

impl PoolCounters {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / total as f64) * 100.0
        }
    }
}

/// State of one cached frame, listed in LRU order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    pub page: PageNo,
    pub dirty: bool,
    pub pinned: bool,
}

/// Diagnostic snapshot of a pool
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub page_count: PageNo,
    pub page_size: u32,
    pub last_page_size: u32,
    pub cached: u32,
    pub max_cache: u32,
    pub counters: PoolCounters,
    /// Cached frames from least to most recently used
    pub frames: Vec<FrameSummary>,
    /// Reference history sorted by page number
    pub references: Vec<ReferenceRecord>,
    /// Estimated bytes held by the pool
    pub memory_bytes: u64,
}

impl StatsReport {
    pub fn hit_rate(&self) -> f64 {
        self.counters.hit_rate()
    }

    /// Hit count recorded for `page`, if it was ever touched
    pub fn page_hits(&self, page: PageNo) -> Option<u32> {
        self.references
            .binary_search_by_key(&page, |record| record.page)
            .ok()
            .map(|idx| self.references[idx].hits)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counters;
        writeln!(f, "{} pages in the file", self.page_count)?;
        writeln!(
            f,
            "page size {}, caching {} pages of {} page max cache",
            self.page_size, self.cached, self.max_cache
        )?;
        writeln!(
            f,
            "{} page puts, {} page gets, {} page new",
            c.puts, c.gets, c.news
        )?;
        writeln!(f, "{} page allocs, {} page flushes", c.allocs, c.flushes)?;
        if c.cache_hits + c.cache_misses > 0 {
            writeln!(
                f,
                "{:.0}% cache hit rate ({} hits, {} misses)",
                c.hit_rate(),
                c.cache_hits,
                c.cache_misses
            )?;
        }
        writeln!(f, "{} page reads, {} page writes", c.reads, c.writes)?;
        writeln!(f, "{} listhits, {} listallocs", c.list_hits, c.list_allocs)?;
        writeln!(f, "memory pool used {} bytes", self.memory_bytes)?;

        for (idx, frame) in self.frames.iter().enumerate() {
            if idx > 0 {
                f.write_str(if idx % 10 == 0 { "\n" } else { ", " })?;
            }
            write!(f, "{}", frame.page)?;
            if frame.dirty {
                f.write_str("d")?;
            }
            if frame.pinned {
                f.write_str("P")?;
            }
        }
        writeln!(f)?;

        writeln!(f, "Element hits")?;
        for (idx, record) in self.references.iter().enumerate() {
            if idx > 0 {
                f.write_str(if idx % 8 == 0 { "\n" } else { ", " })?;
            }
            write!(f, "{}({})", record.page, record.hits)?;
        }
        writeln!(f)
    }
}
