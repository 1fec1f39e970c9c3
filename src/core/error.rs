use crate::core::PageNo;
use thiserror::Error;

/// Broad failure class of a [`PoolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad page number, foreign token, bad size or config value
    InvalidArgument,
    /// Seek, read, write or flush failure on the backing store
    Io,
    /// A frame buffer or reference record could not be allocated
    OutOfMemory,
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Page {page} out of range (page count: {page_count})")]
    PageOutOfRange { page: PageNo, page_count: PageNo },

    #[error("Page {0} is already pinned")]
    PagePinned(PageNo),

    #[error("Page token for page {0} does not belong to a live pin in this pool")]
    ForeignPage(PageNo),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(u32),

    #[error("Cannot extend to page {page}: page count is already {page_count}")]
    InvalidExtend { page: PageNo, page_count: PageNo },

    #[error("Invalid pool configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Seek landed at offset {actual}, expected {expected}")]
    SeekMismatch { expected: u64, actual: u64 },

    #[error("Short read on page {page}: expected {expected} bytes")]
    ShortRead { page: PageNo, expected: usize },

    #[error("Backing store is not a regular seekable file")]
    NotSeekable,

    #[error("Page {0} is not cached")]
    PageNotCached(PageNo),

    #[error("File of {len} bytes needs more pages than addressable at page size {page_size}")]
    FileTooLarge { len: u64, page_size: u32 },

    #[error("Out of memory allocating {what}")]
    OutOfMemory { what: &'static str },
}

impl PoolError {
    /// Map the error onto its failure class
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::PageOutOfRange { .. }
            | PoolError::PagePinned(_)
            | PoolError::ForeignPage(_)
            | PoolError::InvalidPageSize(_)
            | PoolError::InvalidExtend { .. }
            | PoolError::Config(_) => ErrorKind::InvalidArgument,
            PoolError::Io(_)
            | PoolError::SeekMismatch { .. }
            | PoolError::ShortRead { .. }
            | PoolError::NotSeekable
            | PoolError::PageNotCached(_)
            | PoolError::FileTooLarge { .. } => ErrorKind::Io,
            PoolError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
        }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
