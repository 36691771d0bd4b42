//! # Database File Tests
//!
//! Create, reopen and reject database files on disk.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use maho::config::{DEFAULT_PAGE_SIZE, FILE_SIGNATURE, MIN_PAGE_SIZE};
use maho::storage::{FileStore, FormatError, TableLocator};
use tempfile::tempdir;

fn patch(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

fn format_error(path: &Path) -> FormatError {
    let err = FileStore::open(path).unwrap_err();
    assert!(
        err.to_string().contains("invalid database file"),
        "missing context: {}",
        err
    );
    err.downcast_ref::<FormatError>()
        .cloned()
        .unwrap_or_else(|| panic!("not a format error: {:?}", err))
}

#[test]
fn reopen_keeps_pages_and_counts_starts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("main.maho");

    let allocated = {
        let mut store = FileStore::create(&path, MIN_PAGE_SIZE).unwrap();
        assert_eq!(store.start_count(), 1);
        let page = store.allocate_page().unwrap();
        store.page_mut(page).unwrap()[..5].copy_from_slice(b"hello");
        store.sync().unwrap();
        page
    };

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.start_count(), 2);
    assert_eq!(store.page_size(), MIN_PAGE_SIZE);
    assert!(store.is_allocated(allocated).unwrap());
    assert_eq!(&store.page(allocated).unwrap()[..5], b"hello");
    drop(store);

    assert_eq!(FileStore::open(&path).unwrap().start_count(), 3);
}

#[test]
fn directory_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dir.maho");

    let locators: Vec<TableLocator> = (0..100u32)
        .map(|i| TableLocator::new(4096 + i, 7, (i * 8) as u16, 8))
        .collect();
    {
        let mut store = FileStore::create(&path, MIN_PAGE_SIZE).unwrap();
        for locator in &locators {
            store.add_table_locator(*locator).unwrap();
        }
        store.sync().unwrap();
    }

    let store = FileStore::open(&path).unwrap();
    assert_ne!(store.directory_root().unwrap(), 0);
    assert_eq!(store.table_locators().unwrap(), locators);
    assert_eq!(store.find_table(4096 + 99).unwrap(), Some(locators[99]));
    assert_eq!(store.find_table(1).unwrap(), None);
}

#[test]
fn builder_creates_then_opens() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("built.maho");

    let missing = FileStore::builder().path(&path).create(false).open();
    assert!(missing.unwrap_err().to_string().contains("does not exist"));
    assert!(!path.exists());

    let store = FileStore::builder().path(&path).page_size(4096).open().unwrap();
    assert_eq!(store.page_size(), 4096);
    assert_eq!(store.start_count(), 1);
    drop(store);

    let store = FileStore::builder()
        .path(&path)
        .page_size(DEFAULT_PAGE_SIZE)
        .open()
        .unwrap();
    assert_eq!(store.page_size(), 4096);
    assert_eq!(store.start_count(), 2);
}

#[test]
fn create_refuses_existing_file_and_bad_page_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dup.maho");
    FileStore::create(&path, MIN_PAGE_SIZE).unwrap();
    assert!(FileStore::create(&path, MIN_PAGE_SIZE).is_err());

    let err = FileStore::create(dir.path().join("odd.maho"), 1000).unwrap_err();
    assert_eq!(
        err.downcast_ref::<FormatError>(),
        Some(&FormatError::BadPageSize { size: 1000 })
    );
    assert!(!dir.path().join("odd.maho").exists());
}

#[test]
fn bad_signature_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sig.maho");
    FileStore::create(&path, MIN_PAGE_SIZE).unwrap();
    patch(&path, 0, b"Not");

    let mut expected = *FILE_SIGNATURE;
    expected[..3].copy_from_slice(b"Not");
    assert_eq!(format_error(&path), FormatError::BadSignature { found: expected });
}

#[test]
fn unsupported_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ver.maho");
    FileStore::create(&path, MIN_PAGE_SIZE).unwrap();
    patch(&path, 16, &7u16.to_le_bytes());

    assert_eq!(format_error(&path), FormatError::UnsupportedVersion { found: 7 });
}

#[test]
fn corrupt_page_size_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("size.maho");
    FileStore::create(&path, MIN_PAGE_SIZE).unwrap();
    patch(&path, 18, &1500u32.to_le_bytes());

    assert_eq!(format_error(&path), FormatError::BadPageSize { size: 1500 });
}

#[test]
fn short_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.maho");
    std::fs::write(&path, b"MahoData").unwrap();

    assert_eq!(format_error(&path), FormatError::Truncated { len: 8 });
}
