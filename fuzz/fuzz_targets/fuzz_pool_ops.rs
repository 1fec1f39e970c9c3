#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use mpool_rs::{PagePool, PinnedPage, PoolError};
use std::io::Cursor;

/// Acquisition errors a random op stream can legitimately hit
fn expected_miss(err: &PoolError) -> bool {
    matches!(
        err,
        PoolError::PagePinned(_)
            | PoolError::PageOutOfRange { .. }
            // A short last page that later became a middle page
            | PoolError::ShortRead { .. }
    )
}

#[derive(Debug, Arbitrary)]
enum PoolOp {
    Append { fill: u8 },
    Extend { skip: u8, last: u16 },
    Get { page: u16, fill: Option<u8> },
    Hold { page: u16 },
    Drop,
    Sync,
    SyncPage { page: u16 },
}

// Random operation streams must never panic or corrupt the pool's lists
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let max_cache: u8 = match u.arbitrary() {
        Ok(m) => m,
        Err(_) => return,
    };
    let ops: Vec<PoolOp> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let mut pool = PagePool::open(Cursor::new(Vec::new()), 256, u32::from(max_cache % 8)).unwrap();
    let mut held: Vec<PinnedPage> = Vec::new();

    for op in ops.iter().take(200) {
        match *op {
            PoolOp::Append { fill } => {
                let page = pool.append_page().unwrap();
                pool.page_mut(&page).unwrap().fill(fill);
                pool.release(page, true).unwrap();
            }
            PoolOp::Extend { skip, last } => {
                let target = pool.page_count() + u32::from(skip % 16);
                let last = u32::from(last % 256) + 1;
                let page = pool.extend_to(target, last).unwrap();
                pool.release(page, true).unwrap();
            }
            PoolOp::Get { page, fill } => {
                match pool.acquire_existing(u32::from(page)) {
                    Ok(pinned) => {
                        if let Some(fill) = fill {
                            pool.page_mut(&pinned).unwrap().fill(fill);
                        }
                        pool.release(pinned, fill.is_some()).unwrap();
                    }
                    Err(err) => assert!(expected_miss(&err), "unexpected error: {}", err),
                }
            }
            PoolOp::Hold { page } if held.len() < 8 => {
                match pool.acquire_existing(u32::from(page)) {
                    Ok(pinned) => held.push(pinned),
                    Err(err) => assert!(expected_miss(&err), "unexpected error: {}", err),
                }
            }
            PoolOp::Drop => {
                if let Some(pinned) = held.pop() {
                    pool.release(pinned, false).unwrap();
                }
            }
            PoolOp::Sync => {
                pool.sync().unwrap();
            }
            PoolOp::SyncPage { page } => {
                match pool.sync_page(u32::from(page)) {
                    Ok(()) | Err(PoolError::PageNotCached(_)) | Err(PoolError::PageOutOfRange { .. }) => {}
                    Err(err) => panic!("unexpected sync error: {}", err),
                }
            }
            _ => {}
        }

        let stats = pool.stats();
        // Frames parked by a failed read are allocated but not listed
        assert!(stats.frames.len() as u32 <= stats.cached);
        assert_eq!(stats.frames.iter().filter(|f| f.pinned).count(), held.len());
    }
});
