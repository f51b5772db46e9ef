use std::sync::Arc;

use anyhow::Result;

use ferrodb::common::types::{Page, PAGE_SIZE};
use ferrodb::storage::buffer::{BufferPoolError, BufferPoolInstance, ParallelBufferPool};
use ferrodb::storage::disk::DiskManager;

mod common;
use common::{create_temp_db_file, create_test_buffer_pool};

#[test]
fn test_single_instance_allocates_sequential_ids() -> Result<()> {
    let (_file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let pool = BufferPoolInstance::new(10, 1, 0, disk_manager);

    let (pid0, _) = pool.new_page()?;
    let (pid1, _) = pool.new_page()?;
    assert_eq!(pid0, 0);
    assert_eq!(pid1, 1);
    Ok(())
}

#[test]
fn test_dirty_page_written_back_before_reuse() -> Result<()> {
    let (_file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path.clone())?);
    let pool = BufferPoolInstance::new(2, 1, 0, disk_manager);

    let (pid0, page0) = pool.new_page()?;
    assert_eq!(pid0, 0);
    let (pid1, _page1) = pool.new_page()?;
    assert_eq!(pid1, 1);

    {
        let mut page = page0.write();
        page.data[0..4].copy_from_slice(b"mark");
    }
    pool.unpin_page(pid0, true)?;

    // both frames taken, page 0 unpinned: the next allocation must evict
    // it and write it back first
    let (pid2, _page2) = pool.new_page()?;
    assert_eq!(pid2, 2);

    let checker = DiskManager::new(path)?;
    let mut on_disk = Page::new(pid0);
    checker.read_page(pid0, &mut on_disk)?;
    assert_eq!(&on_disk.data[0..4], b"mark");
    Ok(())
}

#[test]
fn test_all_pinned_pool_rejects_fetch() -> Result<()> {
    let (_file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let pool = BufferPoolInstance::new(2, 1, 0, disk_manager);

    let (pid0, _p0) = pool.new_page()?;
    let (pid1, _p1) = pool.new_page()?;

    assert!(matches!(
        pool.new_page(),
        Err(BufferPoolError::BufferPoolFull)
    ));

    // releasing one pin makes room again
    pool.unpin_page(pid0, false)?;
    let (pid2, _) = pool.new_page()?;
    assert_eq!(pid2, 2);

    pool.unpin_page(pid1, false)?;
    pool.unpin_page(pid2, false)?;
    Ok(())
}

#[test]
fn test_clean_unpin_then_fetch_sees_same_bytes() -> Result<()> {
    let (pool, _file) = create_test_buffer_pool(1, 10)?;

    let (pid, page) = pool.new_page()?;
    {
        let mut guard = page.write();
        guard.data[100..104].copy_from_slice(b"abcd");
    }
    // dirty write, then a clean unpin/fetch round trip
    pool.unpin_page(pid, true)?;

    let fetched = pool.fetch_page(pid)?;
    let snapshot: Vec<u8> = fetched.read().data.to_vec();
    pool.unpin_page(pid, false)?;

    let fetched_again = pool.fetch_page(pid)?;
    assert_eq!(fetched_again.read().data.to_vec(), snapshot);
    pool.unpin_page(pid, false)?;
    Ok(())
}

#[test]
fn test_eviction_round_trip_through_disk() -> Result<()> {
    let (pool, _file) = create_test_buffer_pool(1, 3)?;

    let mut pids = Vec::new();
    for i in 0u8..6 {
        let (pid, page) = pool.new_page()?;
        {
            let mut guard = page.write();
            guard.data[0] = i;
        }
        pool.unpin_page(pid, true)?;
        pids.push(pid);
    }

    // every page must come back intact, whether from memory or disk
    for (i, &pid) in pids.iter().enumerate() {
        let page = pool.fetch_page(pid)?;
        assert_eq!(page.read().data[0], i as u8);
        pool.unpin_page(pid, false)?;
    }
    Ok(())
}

#[test]
fn test_parallel_pool_routes_by_residue() -> Result<()> {
    let (_file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let pool = ParallelBufferPool::new(3, 4, disk_manager);
    assert_eq!(pool.pool_size(), 12);

    let mut pids = Vec::new();
    for _ in 0..6 {
        let (pid, _) = pool.new_page()?;
        pids.push(pid);
    }
    // round-robin allocation walks the instances, so consecutive
    // allocations land in different residue classes
    for window in pids.windows(2) {
        assert_ne!(window[0] % 3, window[1] % 3);
    }

    for &pid in &pids {
        pool.unpin_page(pid, true)?;
    }
    for &pid in &pids {
        let page = pool.fetch_page(pid)?;
        assert_eq!(page.read().page_id, pid);
        pool.unpin_page(pid, false)?;
    }
    Ok(())
}

#[test]
fn test_delete_page_refuses_pinned() -> Result<()> {
    let (pool, _file) = create_test_buffer_pool(1, 4)?;

    let (pid, _page) = pool.new_page()?;
    assert!(matches!(
        pool.delete_page(pid),
        Err(BufferPoolError::PagePinned(_))
    ));

    pool.unpin_page(pid, false)?;
    pool.delete_page(pid)?;
    Ok(())
}

#[test]
fn test_flush_page_clears_dirty_state() -> Result<()> {
    let (_file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path.clone())?);
    let pool = BufferPoolInstance::new(4, 1, 0, disk_manager);

    let (pid, page) = pool.new_page()?;
    {
        let mut guard = page.write();
        guard.data[10] = 0x5a;
    }
    pool.flush_page(pid)?;
    pool.unpin_page(pid, false)?;

    let checker = DiskManager::new(path)?;
    let mut on_disk = Page::new(pid);
    checker.read_page(pid, &mut on_disk)?;
    assert_eq!(on_disk.data[10], 0x5a);
    assert_eq!(on_disk.data.len(), PAGE_SIZE);
    Ok(())
}

#[test]
fn test_unpin_unknown_page_fails() -> Result<()> {
    let (pool, _file) = create_test_buffer_pool(1, 4)?;
    assert!(matches!(
        pool.unpin_page(123, false),
        Err(BufferPoolError::PageNotFound(123))
    ));
    Ok(())
}
