#![no_main]
use libfuzzer_sys::fuzz_target;
use mpool_rs::PagePool;
use std::io::Cursor;

// Arbitrary file contents and page sizes must open and scan without panicking
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let page_size = u32::from(u16::from_le_bytes([data[0], data[1]]));
    let mut pool = match PagePool::open(Cursor::new(data[2..].to_vec()), page_size, 2) {
        Ok(p) => p,
        Err(_) => return,
    };

    for page_no in 0..pool.page_count().min(64) {
        let page = pool.acquire_existing(page_no).unwrap();
        let len = pool.io_len(page_no);
        assert!(pool.page(&page).unwrap()[len..].iter().all(|&b| b == 0));
        pool.release(page, false).unwrap();
    }
});
