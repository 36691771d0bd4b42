//! # Directory Pages
//!
//! The directory maps table ids to the place their metadata is stored. It is
//! a singly linked list of pages starting at the summary's `directory` field.
//!
//! ## Layout
//!
//! ```text
//! Header (16 bytes, little-endian)
//! Offset  Size  Field        Description
//! ------  ----  -----------  ----------------------------------------
//! 0       1     page_type    0x02
//! 1       1     reserved
//! 2       2     entry_count  entries stored in this page
//! 4       4     bytes_used   header + entry_count * 16
//! 8       8     next         next directory page, 0 at the tail
//!
//! Entry (16 bytes)
//! 0       8     table_page   page holding the table's metadata
//! 8       4     table_id
//! 12      2     offset       byte offset within table_page
//! 14      2     length       byte length within table_page
//! ```

use eyre::{ensure, Result};
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::page::{PageNum, PageType};
use crate::config::{DIRECTORY_ENTRY_SIZE, DIRECTORY_HEADER_SIZE};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct DirectoryHeader {
    page_type: u8,
    reserved: u8,
    entry_count: U16,
    bytes_used: U32,
    next: U64,
}

const _: () = assert!(std::mem::size_of::<DirectoryHeader>() == DIRECTORY_HEADER_SIZE);

impl DirectoryHeader {
    pub fn new() -> Self {
        Self {
            page_type: PageType::Directory as u8,
            reserved: 0,
            entry_count: U16::new(0),
            bytes_used: U32::new(DIRECTORY_HEADER_SIZE as u32),
            next: U64::new(0),
        }
    }

    pub fn from_bytes(page: &[u8]) -> Result<&Self> {
        ensure!(
            page.len() >= DIRECTORY_HEADER_SIZE,
            "buffer too small for DirectoryHeader: {} < {}",
            page.len(),
            DIRECTORY_HEADER_SIZE
        );
        let header = Self::ref_from_bytes(&page[..DIRECTORY_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse DirectoryHeader: {:?}", e))?;
        header.check(page.len())?;
        Ok(header)
    }

    pub fn from_bytes_mut(page: &mut [u8]) -> Result<&mut Self> {
        let page_len = page.len();
        ensure!(
            page_len >= DIRECTORY_HEADER_SIZE,
            "buffer too small for DirectoryHeader: {} < {}",
            page_len,
            DIRECTORY_HEADER_SIZE
        );
        let header = Self::mut_from_bytes(&mut page[..DIRECTORY_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse DirectoryHeader: {:?}", e))?;
        header.check(page_len)?;
        Ok(header)
    }

    fn check(&self, page_len: usize) -> Result<()> {
        ensure!(
            self.page_type == PageType::Directory as u8,
            "page type {:#04x} is not a directory page",
            self.page_type
        );
        ensure!(
            self.entry_count.get() as usize <= entries_per_page(page_len),
            "directory entry count {} exceeds page capacity {}",
            self.entry_count.get(),
            entries_per_page(page_len)
        );
        Ok(())
    }

    zerocopy_accessors! {
        entry_count: u16,
        bytes_used: u32,
        next: u64,
    }
}

impl Default for DirectoryHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a table's metadata lives.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct TableLocator {
    table_page: U64,
    table_id: U32,
    offset: U16,
    length: U16,
}

const _: () = assert!(std::mem::size_of::<TableLocator>() == DIRECTORY_ENTRY_SIZE);

impl TableLocator {
    pub fn new(table_id: u32, table_page: PageNum, offset: u16, length: u16) -> Self {
        Self {
            table_page: U64::new(table_page),
            table_id: U32::new(table_id),
            offset: U16::new(offset),
            length: U16::new(length),
        }
    }

    zerocopy_accessors! {
        table_page: u64,
        table_id: u32,
        offset: u16,
        length: u16,
    }
}

pub fn entries_per_page(page_len: usize) -> usize {
    page_len.saturating_sub(DIRECTORY_HEADER_SIZE) / DIRECTORY_ENTRY_SIZE
}

/// Formats `page` as an empty directory page with no successor.
pub fn init(page: &mut [u8]) {
    page.fill(0);
    page[..DIRECTORY_HEADER_SIZE].copy_from_slice(DirectoryHeader::new().as_bytes());
}

pub fn entry(page: &[u8], index: usize) -> Result<TableLocator> {
    let header = DirectoryHeader::from_bytes(page)?;
    ensure!(
        index < header.entry_count() as usize,
        "directory entry {} out of range (count={})",
        index,
        header.entry_count()
    );
    let start = DIRECTORY_HEADER_SIZE + index * DIRECTORY_ENTRY_SIZE;
    TableLocator::read_from_bytes(&page[start..start + DIRECTORY_ENTRY_SIZE])
        .map_err(|e| eyre::eyre!("failed to read directory entry {}: {:?}", index, e))
}

pub fn entries(page: &[u8]) -> Result<Vec<TableLocator>> {
    let count = DirectoryHeader::from_bytes(page)?.entry_count() as usize;
    (0..count).map(|i| entry(page, i)).collect()
}

/// Appends `locator`. Returns false when the page is full.
pub fn push(page: &mut [u8], locator: &TableLocator) -> Result<bool> {
    let capacity = entries_per_page(page.len());
    let header = DirectoryHeader::from_bytes_mut(page)?;
    let count = header.entry_count() as usize;
    if count >= capacity {
        return Ok(false);
    }

    header.set_entry_count(count as u16 + 1);
    header.set_bytes_used((DIRECTORY_HEADER_SIZE + (count + 1) * DIRECTORY_ENTRY_SIZE) as u32);

    let start = DIRECTORY_HEADER_SIZE + count * DIRECTORY_ENTRY_SIZE;
    page[start..start + DIRECTORY_ENTRY_SIZE].copy_from_slice(locator.as_bytes());
    Ok(true)
}
