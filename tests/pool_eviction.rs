//! Eviction, pinning and capacity tests

use mpool_rs::{PagePool, PoolError, Result};
use std::io::Cursor;

fn pool_with_pages(pages: u32, page_size: u32, max_cache: u32) -> PagePool<Cursor<Vec<u8>>> {
    let bytes: Vec<u8> = (0..pages)
        .flat_map(|page| std::iter::repeat(page as u8).take(page_size as usize))
        .collect();
    PagePool::open(Cursor::new(bytes), page_size, max_cache).unwrap()
}

fn touch(pool: &mut PagePool<Cursor<Vec<u8>>>, page: u32, dirty: bool) -> Result<()> {
    let pinned = pool.acquire_existing(page)?;
    if dirty {
        pool.page_mut(&pinned)?.fill(0xd0 | page as u8);
    }
    pool.release(pinned, dirty)
}

#[test]
fn test_abc_with_two_frames() -> Result<()> {
    let mut pool = pool_with_pages(3, 256, 2);
    touch(&mut pool, 0, true)?;
    touch(&mut pool, 1, false)?;
    touch(&mut pool, 2, false)?;

    assert!(!pool.is_cached(0));
    assert!(pool.is_cached(1));
    assert!(pool.is_cached(2));

    let stats = pool.stats();
    assert_eq!(stats.counters.writes, 1);
    assert_eq!(stats.counters.flushes, 1);

    let bytes = pool.close().into_inner();
    assert!(bytes[..256].iter().all(|&b| b == 0xd0));
    Ok(())
}

#[test]
fn test_lru_evicts_least_recent() -> Result<()> {
    let n = 4;
    let mut pool = pool_with_pages(n + 1, 128, n);
    for page in 0..n {
        touch(&mut pool, page, false)?;
    }
    touch(&mut pool, n, false)?;

    assert!(!pool.is_cached(0));
    for page in 1..=n {
        assert!(pool.is_cached(page), "page {} should still be cached", page);
    }
    Ok(())
}

#[test]
fn test_pinned_frames_survive_pressure() -> Result<()> {
    let n = 3;
    let mut pool = pool_with_pages(n + 2, 128, n);
    let pinned: Vec<_> = (0..n)
        .map(|page| pool.acquire_existing(page))
        .collect::<Result<_>>()?;

    let extra = pool.acquire_existing(n)?;
    assert_eq!(pool.cached(), n + 1);
    for (page, token) in pinned.iter().enumerate() {
        assert!(pool.page(token)?.iter().all(|&b| b == page as u8));
    }

    pool.release(extra, false)?;
    for token in pinned {
        pool.release(token, false)?;
    }

    // Once everything is released the surplus frame is recycled, not leaked
    touch(&mut pool, n + 1, false)?;
    assert_eq!(pool.cached(), n + 1);
    Ok(())
}

#[test]
fn test_pinned_page_is_never_the_victim() -> Result<()> {
    let mut pool = pool_with_pages(3, 64, 2);
    let held = pool.acquire_existing(0)?;
    touch(&mut pool, 1, false)?;
    touch(&mut pool, 2, false)?;

    assert!(pool.is_cached(0));
    assert!(!pool.is_cached(1));
    assert!(pool.page(&held)?.iter().all(|&b| b == 0));
    pool.release(held, false)
}

#[test]
fn test_double_acquire_is_rejected() -> Result<()> {
    let mut pool = pool_with_pages(2, 64, 2);
    let held = pool.acquire_existing(1)?;
    let err = pool.acquire_existing(1).unwrap_err();
    assert!(matches!(err, PoolError::PagePinned(1)));
    assert_eq!(err.kind(), mpool_rs::ErrorKind::InvalidArgument);
    pool.release(held, false)
}

#[test]
fn test_sync_writes_pinned_dirty_pages() -> Result<()> {
    let mut pool = pool_with_pages(2, 64, 2);
    let held = pool.acquire_existing(0)?;
    pool.page_mut(&held)?.fill(0xaa);
    pool.release(held, true)?;

    let again = pool.acquire_existing(0)?;
    pool.sync()?;
    assert_eq!(pool.is_dirty(0), Some(false));
    pool.release(again, false)?;

    let bytes = pool.close().into_inner();
    assert!(bytes[..64].iter().all(|&b| b == 0xaa));
    Ok(())
}

#[test]
fn test_stats_dump_after_workload() -> Result<()> {
    let mut pool = pool_with_pages(4, 64, 2);
    for page in [0, 1, 0, 2, 3, 0] {
        touch(&mut pool, page, page % 2 == 1)?;
    }
    let stats = pool.stats();
    assert_eq!(stats.counters.gets, 6);
    assert_eq!(stats.counters.puts, 6);
    assert_eq!(stats.counters.cache_hits + stats.counters.cache_misses, 6);
    assert_eq!(stats.cached, 2);

    let text = stats.to_string();
    assert!(text.contains("4 pages in the file"));
    assert!(text.contains("page size 64, caching 2 pages of 2 page max cache"));
    assert!(text.contains("Element hits"));

    let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
    assert_eq!(json["counters"]["gets"], 6);
    Ok(())
}
