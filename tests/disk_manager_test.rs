//! Integration tests for the disk manager

use strata::common::{PageId, PAGE_SIZE};
use strata::storage::disk::DiskManager;
use tempfile::NamedTempFile;

#[test]
fn test_write_then_read() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let mut data = [0u8; PAGE_SIZE];
    data[0] = 0xDE;
    data[PAGE_SIZE - 1] = 0xAD;
    dm.write_page(PageId::new(0), &data).unwrap();

    let mut read_back = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(0), &mut read_back).unwrap();
    assert_eq!(read_back[0], 0xDE);
    assert_eq!(read_back[PAGE_SIZE - 1], 0xAD);
}

#[test]
fn test_pages_do_not_overlap() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    for i in 0..4u8 {
        let data = [i; PAGE_SIZE];
        dm.write_page(PageId::new(i as u32), &data).unwrap();
    }
    for i in 0..4u8 {
        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(i as u32), &mut data).unwrap();
        assert!(data.iter().all(|&b| b == i));
    }
}

#[test]
fn test_sparse_page_reads_zeroed() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    // Write page 5, leaving 0..5 as holes.
    let data = [1u8; PAGE_SIZE];
    dm.write_page(PageId::new(5), &data).unwrap();

    let mut hole = [9u8; PAGE_SIZE];
    dm.read_page(PageId::new(2), &mut hole).unwrap();
    assert!(hole.iter().all(|&b| b == 0));
}

#[test]
fn test_counters_track_io() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let data = [0u8; PAGE_SIZE];
    let mut buf = [0u8; PAGE_SIZE];
    dm.write_page(PageId::new(0), &data).unwrap();
    dm.write_page(PageId::new(1), &data).unwrap();
    dm.read_page(PageId::new(0), &mut buf).unwrap();

    assert_eq!(dm.num_writes(), 2);
    assert_eq!(dm.num_reads(), 1);
}

#[test]
fn test_contents_survive_reopen() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    {
        let dm = DiskManager::new(&path).unwrap();
        let mut data = [0u8; PAGE_SIZE];
        data[123] = 45;
        dm.write_page(PageId::new(7), &data).unwrap();
        dm.sync().unwrap();
    }

    let dm = DiskManager::new(&path).unwrap();
    let mut data = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(7), &mut data).unwrap();
    assert_eq!(data[123], 45);
}
