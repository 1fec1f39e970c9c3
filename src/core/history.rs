//! Reference history
//!
//! Records every page number the pool has ever touched, independent of whether
//! the page is still cached. A missing record means the page has never been
//! seen, which is how the pool recognizes pages inside an extend gap and skips
//! reading them from disk.

use crate::core::error::{PoolError, Result};
use crate::core::PageNo;
use ahash::AHashMap;
use serde::Serialize;

/// Provenance of a page number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceState {
    /// Created by new/extend or gap access; never written
    NotOnDisk,
    /// Page-in in progress
    Reading,
    /// Released dirty since the last write-back
    Dirty,
    /// Valid on disk
    OnDisk,
}

/// One touched page number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceRecord {
    pub page: PageNo,
    pub state: ReferenceState,
    /// Diagnostic hit counter
    pub hits: u32,
}

#[derive(Debug, Default)]
pub(crate) struct ReferenceHistory {
    records: AHashMap<PageNo, ReferenceRecord>,
    /// Lookups that found an existing record
    pub list_hits: u64,
    /// Records created
    pub list_allocs: u64,
}

impl ReferenceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `OnDisk` record for each page of a pre-existing file
    pub fn with_existing_pages(page_count: PageNo) -> Result<Self> {
        let mut history = Self::new();
        history
            .records
            .try_reserve(page_count as usize)
            .map_err(|_| PoolError::OutOfMemory {
                what: "reference records",
            })?;
        for page in 0..page_count {
            history.records.insert(
                page,
                ReferenceRecord {
                    page,
                    state: ReferenceState::OnDisk,
                    hits: 0,
                },
            );
        }
        history.list_allocs = u64::from(page_count);
        Ok(history)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, page: PageNo) -> Option<&ReferenceRecord> {
        self.records.get(&page)
    }

    /// Look up a record and count the hit
    pub fn touch(&mut self, page: PageNo) -> Option<&mut ReferenceRecord> {
        let record = self.records.get_mut(&page)?;
        record.hits = record.hits.saturating_add(1);
        self.list_hits += 1;
        Some(record)
    }

    /// Count a hit, creating a `NotOnDisk` record when the page is new.
    ///
    /// Returns whether the record already existed.
    pub fn touch_or_insert(&mut self, page: PageNo) -> Result<bool> {
        if self.touch(page).is_some() {
            return Ok(true);
        }

        self.records
            .try_reserve(1)
            .map_err(|_| PoolError::OutOfMemory {
                what: "reference record",
            })?;
        self.records.insert(
            page,
            ReferenceRecord {
                page,
                state: ReferenceState::NotOnDisk,
                hits: 1,
            },
        );
        self.list_allocs += 1;
        Ok(false)
    }

    /// Set the state of an existing record, counting the hit
    pub fn mark(&mut self, page: PageNo, state: ReferenceState) {
        if let Some(record) = self.touch(page) {
            record.state = state;
        }
    }

    /// Set the state without counting a hit (rollback paths)
    pub fn restore(&mut self, page: PageNo, state: ReferenceState) {
        if let Some(record) = self.records.get_mut(&page) {
            record.state = state;
        }
    }

    /// All records sorted by page number
    pub fn sorted(&self) -> Vec<ReferenceRecord> {
        let mut records: Vec<_> = self.records.values().copied().collect();
        records.sort_unstable_by_key(|record| record.page);
        records
    }
}
