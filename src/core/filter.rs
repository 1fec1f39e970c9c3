//! Page-in / page-out hooks
//!
//! Filters see the bytes of one page at the moment it crosses the disk
//! boundary: after a read (input filter) or right before a write (output
//! filter). The slice passed in is the page's I/O region, so the final page
//! of a file whose length is not a multiple of the page size is shorter than
//! `page_size`. The pool never interprets what a filter does.

use crate::core::PageNo;

/// Hook invoked with a page number and the page's I/O bytes
pub trait PageFilter: Send {
    fn apply(&mut self, page: PageNo, bytes: &mut [u8]);
}

impl<F> PageFilter for F
where
    F: FnMut(PageNo, &mut [u8]) + Send,
{
    fn apply(&mut self, page: PageNo, bytes: &mut [u8]) {
        self(page, bytes)
    }
}

/// Boxed filter as stored by the pool
pub type BoxedFilter = Box<dyn PageFilter>;
