//! File-backed pool lifecycle tests: open, modify, sync, close, reopen

use mpool_rs::{PagePool, PagePoolBuilder, PoolError, ReferenceState, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tempfile::TempDir;

fn open_rw(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .unwrap()
}

#[test]
fn test_round_trip_through_reopen() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("roundtrip.pages");

    {
        let mut pool = PagePool::open(open_rw(&path), 1024, 4)?;
        for page_no in 0..6u32 {
            let page = pool.append_page()?;
            assert_eq!(page.page_no(), page_no);
            pool.page_mut(&page)?.fill(page_no as u8 + 1);
            pool.release(page, true)?;
        }
        pool.sync()?;
        pool.close();
    }

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 6 * 1024);

    let mut pool = PagePool::open(open_rw(&path), 1024, 4)?;
    assert_eq!(pool.page_count(), 6);
    for page_no in (0..6u32).rev() {
        let page = pool.acquire_existing(page_no)?;
        assert!(pool.page(&page)?.iter().all(|&b| b == page_no as u8 + 1));
        pool.release(page, false)?;
    }
    Ok(())
}

#[test]
fn test_short_last_page_scenario() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("short.pages");
    std::fs::write(&path, vec![0u8; 10_000]).unwrap();

    let mut pool = PagePool::open(open_rw(&path), 4096, 2)?;
    assert_eq!(pool.page_count(), 3);
    assert_eq!(pool.last_page_size(), 10_000 - 8192);

    let page = pool.acquire_existing(2)?;
    pool.page_mut(&page)?[..1808].fill(0xee);
    pool.release(page, true)?;
    pool.sync()?;
    pool.close();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 10_000);
    assert!(bytes[..8192].iter().all(|&b| b == 0));
    assert!(bytes[8192..].iter().all(|&b| b == 0xee));
    Ok(())
}

#[test]
fn test_page_aligned_file_uses_full_last_page() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("aligned.pages");
    std::fs::write(&path, vec![3u8; 8192]).unwrap();

    let pool = PagePool::open(open_rw(&path), 4096, 2)?;
    assert_eq!(pool.page_count(), 2);
    assert_eq!(pool.last_page_size(), 4096);
    assert_eq!(pool.io_len(1), 4096);
    Ok(())
}

#[test]
fn test_extend_gap_places_page_at_offset() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("extend.pages");

    let mut pool = PagePool::open(open_rw(&path), 512, 4)?;
    let first = pool.append_page()?;
    pool.page_mut(&first)?.fill(1);
    pool.release(first, true)?;

    let far = pool.extend_to(9, 40)?;
    pool.page_mut(&far)?[..40].fill(9);
    pool.release(far, true)?;
    assert_eq!(pool.page_count(), 10);

    // Gap pages are never read from disk
    let gap = pool.acquire_existing(4)?;
    pool.release(gap, false)?;
    assert_eq!(pool.stats().counters.reads, 0);
    assert_eq!(
        pool.reference(4).map(|r| r.state),
        Some(ReferenceState::NotOnDisk)
    );

    pool.sync_page(9)?;
    pool.sync()?;
    pool.close();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 9 * 512 + 40);
    assert!(bytes[..512].iter().all(|&b| b == 1));
    assert!(bytes[9 * 512..].iter().all(|&b| b == 9));

    let pool = PagePool::open(open_rw(&path), 512, 4)?;
    assert_eq!(pool.page_count(), 10);
    assert_eq!(pool.last_page_size(), 40);
    Ok(())
}

#[test]
fn test_dirty_gap_page_survives_eviction() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("gap-evict.pages");

    let mut pool = PagePool::open(open_rw(&path), 512, 1)?;
    let far = pool.extend_to(6, 512)?;
    pool.page_mut(&far)?.fill(6);
    pool.release(far, true)?;

    // Evicts page 6 (written back); the gap page itself is never read
    let gap = pool.acquire_existing(3)?;
    assert!(pool.page(&gap)?.iter().all(|&b| b == 0));
    pool.page_mut(&gap)?.fill(0x33);
    pool.release(gap, true)?;
    assert_eq!(pool.stats().counters.reads, 0);

    // Evicts page 3, writing it back
    let other = pool.acquire_existing(1)?;
    pool.release(other, false)?;
    assert!(!pool.is_cached(3));
    assert_eq!(
        pool.reference(3).map(|r| r.state),
        Some(ReferenceState::OnDisk)
    );

    let gap = pool.acquire_existing(3)?;
    assert!(pool.page(&gap)?.iter().all(|&b| b == 0x33));
    pool.release(gap, false)?;
    assert_eq!(pool.stats().counters.reads, 1);

    // Page 1 was evicted clean and never written, so it still skips the read
    let other = pool.acquire_existing(1)?;
    assert!(pool.page(&other)?.iter().all(|&b| b == 0));
    pool.release(other, false)?;
    assert_eq!(pool.stats().counters.reads, 1);
    assert_eq!(
        pool.reference(1).map(|r| r.state),
        Some(ReferenceState::NotOnDisk)
    );

    pool.close();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 7 * 512);
    assert!(bytes[3 * 512..4 * 512].iter().all(|&b| b == 0x33));
    assert!(bytes[6 * 512..].iter().all(|&b| b == 6));
    Ok(())
}

#[test]
fn test_close_without_sync_loses_changes() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("unsynced.pages");
    std::fs::write(&path, vec![0u8; 2048]).unwrap();

    let mut pool = PagePool::open(open_rw(&path), 1024, 4)?;
    let page = pool.acquire_existing(1)?;
    pool.page_mut(&page)?.fill(0x77);
    pool.release(page, true)?;
    pool.close();

    assert_eq!(std::fs::read(&path).unwrap(), vec![0u8; 2048]);
    Ok(())
}

#[test]
fn test_block_size_default_page_size() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("blksize.pages");

    let pool = PagePoolBuilder::new().open_path(&path)?;
    assert!(pool.page_size() > 0);
    assert_eq!(pool.page_count(), 0);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_directory_is_not_seekable() {
    let temp_dir = TempDir::new().unwrap();
    let dir = File::open(temp_dir.path()).unwrap();
    let err = PagePool::open(dir, 4096, 1).unwrap_err();
    assert!(matches!(err, PoolError::NotSeekable));
    assert_eq!(err.kind(), mpool_rs::ErrorKind::Io);
}
