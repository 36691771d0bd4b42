//! # Storage Module
//!
//! A database lives in one file of fixed-size pages, memory-mapped for
//! zero-copy access. Pages are handed out as `&[u8]` / `&mut [u8]` slices
//! borrowed from the store, so the borrow checker prevents a page from being
//! held across a remap and gives writers exclusive access to a page.
//!
//! ## File Layout
//!
//! ```text
//! +--------------------+  page 0
//! | summary            |  signature, version, page size, directory root,
//! |                    |  start count
//! +--------------------+  page 1
//! | inventory          |  allocation bitmap for pages 1 .. 1+S
//! +--------------------+  page 2 ..
//! | directory / data   |  directory pages link to one another; data pages
//! | / free pages       |  are owned by tables
//! +--------------------+  page 1+S
//! | inventory          |  next section
//! +--------------------+
//! ```
//!
//! where `S = (page_size - 1) * 8`.
//!
//! ## Endianness
//!
//! Every multi-byte field in the summary, inventory and directory pages is
//! little-endian. Keys produced by `encoding::key` use big-endian ids; the two
//! formats are unrelated.
//!
//! ## Module Overview
//!
//! - [`summary`]: page 0 header and [`FormatError`]
//! - [`inventory`]: allocation bitmaps
//! - [`directory`]: table id to [`TableLocator`] pages
//! - [`mmap`]: raw page access over `memmap2`
//! - [`file_store`]: [`FileStore`] tying the above together

pub mod directory;
pub mod file_store;
pub mod inventory;
pub mod mmap;
pub mod page;
pub mod summary;

pub use directory::{DirectoryHeader, TableLocator};
pub use file_store::{FileStore, FileStoreBuilder};
pub use mmap::MmapStorage;
pub use page::{PageNum, PageType};
pub use summary::{validate_page_size, FormatError, SummaryPage};
