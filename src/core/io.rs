//! Backing store I/O for the page pool
//!
//! The pool talks to its backing file only through [`BackingStore`]: positioned
//! whole-page reads and writes, a length probe at open time and a durability
//! flush at sync time. `File`, `&File` and in-memory cursors implement it.

use crate::core::error::{PoolError, Result};
use crate::core::PageNo;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom, Write};

/// Result of a metadata query on the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStat {
    /// Current length in bytes
    pub len: u64,
    /// Preferred I/O block size, if the platform reports one
    pub block_size: Option<u32>,
}

/// Seekable byte store underneath a [`PagePool`](crate::PagePool)
pub trait BackingStore: Read + Write + Seek {
    /// Query length and block size without moving the cursor.
    ///
    /// `Ok(None)` means the store has no metadata; the pool then finds the
    /// length by seeking to the end and uses the default page size.
    fn stat(&mut self) -> Result<Option<StoreStat>> {
        Ok(None)
    }

    /// Push written data to durable storage
    fn sync_data(&mut self) -> Result<()> {
        self.flush()?;
        Ok(())
    }
}

fn file_stat(file: &File) -> Result<Option<StoreStat>> {
    let meta = file.metadata()?;
    if !meta.is_file() {
        return Err(PoolError::NotSeekable);
    }

    Ok(Some(StoreStat {
        len: meta.len(),
        block_size: block_size(&meta),
    }))
}

#[cfg(unix)]
fn block_size(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::MetadataExt;
    u32::try_from(meta.blksize()).ok().filter(|&size| size > 0)
}

#[cfg(not(unix))]
fn block_size(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}

impl BackingStore for File {
    fn stat(&mut self) -> Result<Option<StoreStat>> {
        file_stat(self)
    }

    fn sync_data(&mut self) -> Result<()> {
        self.sync_all()?;
        Ok(())
    }
}

impl BackingStore for &File {
    fn stat(&mut self) -> Result<Option<StoreStat>> {
        file_stat(*self)
    }

    fn sync_data(&mut self) -> Result<()> {
        self.sync_all()?;
        Ok(())
    }
}

impl BackingStore for Cursor<Vec<u8>> {}

impl<S: BackingStore + ?Sized> BackingStore for Box<S> {
    fn stat(&mut self) -> Result<Option<StoreStat>> {
        (**self).stat()
    }

    fn sync_data(&mut self) -> Result<()> {
        (**self).sync_data()
    }
}

/// Length and block size found at open time
#[derive(Debug, Clone, Copy)]
pub(crate) struct Probe {
    pub len: u64,
    pub block_size: Option<u32>,
}

/// Determine the store length, preferring metadata over seek-to-end
pub(crate) fn probe<S: BackingStore>(store: &mut S) -> Result<Probe> {
    if let Some(stat) = store.stat()? {
        return Ok(Probe {
            len: stat.len,
            block_size: stat.block_size,
        });
    }

    let len = store.seek(SeekFrom::End(0))?;
    let told = store.stream_position()?;
    if told != len {
        return Err(PoolError::SeekMismatch {
            expected: len,
            actual: told,
        });
    }

    Ok(Probe {
        len,
        block_size: None,
    })
}

/// Seek to `offset` and confirm the cursor really landed there
fn seek_exact<S: BackingStore>(store: &mut S, offset: u64) -> Result<()> {
    store.seek(SeekFrom::Start(offset))?;
    let actual = store.stream_position()?;
    if actual != offset {
        return Err(PoolError::SeekMismatch {
            expected: offset,
            actual,
        });
    }
    Ok(())
}

/// Read exactly `buf.len()` bytes of page `page` starting at `offset`
pub(crate) fn read_page<S: BackingStore>(
    store: &mut S,
    page: PageNo,
    offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    let expected = buf.len();
    seek_exact(store, offset)?;
    store.read_exact(buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => PoolError::ShortRead { page, expected },
        _ => PoolError::Io(err),
    })
}

/// Write all of `buf` at `offset`
pub(crate) fn write_page<S: BackingStore>(store: &mut S, offset: u64, buf: &[u8]) -> Result<()> {
    seek_exact(store, offset)?;
    store.write_all(buf)?;
    Ok(())
}
