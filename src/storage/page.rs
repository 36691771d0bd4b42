//! # Page Numbers and Page Types
//!
//! A database file is an array of equally sized pages. Page 0 is the summary
//! page; every other page starts with a one-byte page type.
//!
//! ```text
//! Offset 0:               Page 0   summary (signature, version, page size, ...)
//! Offset page_size:       Page 1   inventory for section 0
//! Offset 2 * page_size:   Page 2   directory / table data / free
//! ...
//! ```

use eyre::{bail, Result};

pub type PageNum = u64;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Free = 0x00,
    Inventory = 0x01,
    Directory = 0x02,
    Table = 0x03,
}

impl PageType {
    pub fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0x00 => PageType::Free,
            0x01 => PageType::Inventory,
            0x02 => PageType::Directory,
            0x03 => PageType::Table,
            other => bail!("unknown page type {:#04x}", other),
        })
    }

    pub fn of(page: &[u8]) -> Result<Self> {
        match page.first() {
            Some(&b) => Self::from_byte(b),
            None => bail!("empty page has no page type"),
        }
    }
}
