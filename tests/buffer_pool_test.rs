//! Buffer pool integration tests: pin accounting, eviction, and guard
//! lifetimes.

use std::sync::Arc;
use std::thread;

use siltdb::buffer::BufferPoolManager;
use siltdb::common::{DbError, PageId};
use siltdb::storage::disk::DiskManager;

use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize, k: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    (
        Arc::new(BufferPoolManager::new(pool_size, k, disk_manager)),
        temp_file,
    )
}

#[test]
fn test_full_pool_rejects_then_recovers_after_unpin() {
    let (bpm, _temp) = create_bpm(3, 2);

    let p1 = bpm.new_page().unwrap();
    let _p2 = bpm.new_page().unwrap();
    let _p3 = bpm.new_page().unwrap();

    // All three frames are pinned by their creators.
    assert!(matches!(bpm.new_page(), Err(DbError::PoolExhausted)));

    assert!(bpm.unpin_page(p1, false));
    let p4 = bpm.new_page().unwrap();
    assert_eq!(p4, PageId::new(3));

    // p1 gave up its frame.
    assert_eq!(bpm.pin_count_of(p1), None);
    assert_eq!(bpm.pin_count_of(p4), Some(1));
}

#[test]
fn test_pin_counts_track_fetches_and_unpins() {
    let (bpm, _temp) = create_bpm(4, 2);

    let page_id = bpm.new_page().unwrap();
    assert_eq!(bpm.pin_count_of(page_id), Some(1));

    {
        let _g1 = bpm.fetch_read(page_id).unwrap();
        let _g2 = bpm.fetch_read(page_id).unwrap();
        assert_eq!(bpm.pin_count_of(page_id), Some(3));
    }
    assert_eq!(bpm.pin_count_of(page_id), Some(1));

    assert!(bpm.unpin_page(page_id, false));
    assert_eq!(bpm.pin_count_of(page_id), Some(0));
    assert!(!bpm.unpin_page(page_id, false));
}

#[test]
fn test_replacer_size_matches_unpinned_residents() {
    let (bpm, _temp) = create_bpm(4, 2);

    let pages: Vec<_> = (0..4).map(|_| bpm.new_page().unwrap()).collect();
    assert_eq!(bpm.evictable_count(), 0);

    for &p in &pages {
        bpm.unpin_page(p, false);
    }
    assert_eq!(bpm.evictable_count(), 4);

    let guards: Vec<_> = pages.iter().map(|&p| bpm.fetch_read(p).unwrap()).collect();
    assert_eq!(bpm.evictable_count(), 0);

    drop(guards);
    assert_eq!(bpm.evictable_count(), 4);
}

#[test]
fn test_no_eviction_while_pinned() {
    let (bpm, _temp) = create_bpm(2, 2);

    let p1 = bpm.new_page().unwrap();
    let p2 = bpm.new_page().unwrap();
    bpm.unpin_page(p2, false);

    // Only p2's frame is reusable; p1 must survive the eviction.
    let _p3 = bpm.new_page().unwrap();
    assert_eq!(bpm.pin_count_of(p1), Some(1));
    assert_eq!(bpm.pin_count_of(p2), None);
}

#[test]
fn test_dirty_data_survives_eviction_cycle() {
    let (bpm, _temp) = create_bpm(2, 2);

    let page_id = bpm.new_page().unwrap();
    bpm.unpin_page(page_id, false);
    {
        let mut guard = bpm.fetch_write(page_id).unwrap();
        guard.data_mut()[123] = 77;
    }

    // Force the page out and bring it back from disk.
    for _ in 0..2 {
        let p = bpm.new_page().unwrap();
        bpm.unpin_page(p, false);
    }
    let guard = bpm.fetch_read(page_id).unwrap();
    assert_eq!(guard.data()[123], 77);
}

#[test]
fn test_flush_clears_dirty_without_unpinning() {
    let (bpm, temp) = create_bpm(4, 2);

    let page_id = bpm.new_page().unwrap();
    {
        let mut guard = bpm.fetch_write(page_id).unwrap();
        guard.data_mut()[9] = 9;
    }
    assert!(bpm.flush_page(page_id).unwrap());
    // new_page's pin is still held.
    assert_eq!(bpm.pin_count_of(page_id), Some(1));

    // The write is on disk independent of the pool.
    let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
    let mut data = [0u8; siltdb::common::PAGE_SIZE];
    dm.read_page(page_id, &mut data).unwrap();
    assert_eq!(data[9], 9);
}

#[test]
fn test_delete_page_semantics() {
    let (bpm, _temp) = create_bpm(4, 2);

    let page_id = bpm.new_page().unwrap();
    assert!(!bpm.delete_page(page_id).unwrap());

    bpm.unpin_page(page_id, false);
    assert!(bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.pin_count_of(page_id), None);
    assert_eq!(bpm.free_frame_count(), 4);

    // Deleting a page that was never resident trivially succeeds.
    assert!(bpm.delete_page(PageId::new(400)).unwrap());
}

#[test]
fn test_concurrent_readers_and_writers() {
    let (bpm, _temp) = create_bpm(8, 2);

    let page_id = bpm.new_page().unwrap();
    bpm.unpin_page(page_id, false);

    let mut handles = Vec::new();
    for t in 0..4u8 {
        let bpm = Arc::clone(&bpm);
        handles.push(thread::spawn(move || {
            for i in 0..50u8 {
                let mut guard = bpm.fetch_write(page_id).unwrap();
                let data = guard.data_mut();
                data[t as usize] = i;
                drop(guard);

                let guard = bpm.fetch_read(page_id).unwrap();
                assert!(guard.data()[t as usize] <= 49);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bpm.pin_count_of(page_id), Some(0));
    assert_eq!(bpm.evictable_count(), 1);
}

#[test]
fn test_interleaved_new_fetch_delete_accounting() {
    let (bpm, _temp) = create_bpm(5, 2);

    let mut live = Vec::new();
    for _ in 0..5 {
        let p = bpm.new_page().unwrap();
        bpm.unpin_page(p, false);
        live.push(p);
    }

    // Drop two pages, fetch one, allocate one.
    assert!(bpm.delete_page(live[0]).unwrap());
    assert!(bpm.delete_page(live[1]).unwrap());
    let _guard = bpm.fetch_read(live[2]).unwrap();
    let p6 = bpm.new_page().unwrap();
    bpm.unpin_page(p6, false);

    // 4 resident pages, one pinned by the guard.
    assert_eq!(bpm.evictable_count(), 3);
    assert_eq!(bpm.free_frame_count(), 1);
}
