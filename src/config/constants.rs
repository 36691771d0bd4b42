//! # Storage Core Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships. Anything that is part
//! of a binary format is defined once here and imported everywhere else.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_PAGE_SIZE (16384 bytes)
//!       │
//!       ├─> MIN_PAGE_SIZE (1024, hard floor for any file)
//!       │
//!       ├─> MAX_PAGE_SIZE (65536, directory offsets are u16)
//!       │
//!       ├─> PAGE_SIZE_MULTIPLE (512, page sizes must be a multiple)
//!       │
//!       ├─> SUMMARY_HEADER_SIZE (64 bytes at the start of page 0)
//!       │
//!       ├─> INVENTORY_HEADER_SIZE (1 byte page type)
//!       │     section size = (page_size - 1) * 8 pages per inventory page
//!       │
//!       └─> DIRECTORY_HEADER_SIZE (16 bytes) + DIRECTORY_ENTRY_SIZE (16 bytes)
//!             entries per page = (page_size - 16) / 16
//!
//! VERSION SPACE (u64)
//!       │
//!       ├─> [0, MAX_TRANSACTION_VERSION]            committed versions
//!       ├─> [MIN_PROPOSED_WRITE_VERSION, PROPOSAL)  proposed writes by stmt id
//!       └─> PROPOSAL = u64::MAX                     uncommitted sentinel
//! ```
//!
//! ## Critical Invariants
//!
//! These invariants are enforced by compile-time assertions:
//!
//! 1. `MIN_PAGE_SIZE` and `DEFAULT_PAGE_SIZE` are multiples of `PAGE_SIZE_MULTIPLE`
//! 2. The three version ranges are disjoint and ordered
//! 3. Row stamp tid/cid fields fit in the 48 bits below the in-progress flag

/// Signature stored in the first 16 bytes of page 0.
pub const FILE_SIGNATURE: &[u8; 16] = b"MahoDatabaseFile";
pub const FILE_VERSION: u16 = 1;

pub const DEFAULT_PAGE_SIZE: u32 = 16384;
pub const MIN_PAGE_SIZE: u32 = 1024;
/// Directory entries address bytes within a page with a u16 offset.
pub const MAX_PAGE_SIZE: u32 = 65536;
pub const PAGE_SIZE_MULTIPLE: u32 = 512;

const _: () = assert!(MIN_PAGE_SIZE % PAGE_SIZE_MULTIPLE == 0);
const _: () = assert!(DEFAULT_PAGE_SIZE % PAGE_SIZE_MULTIPLE == 0);
const _: () = assert!(DEFAULT_PAGE_SIZE >= MIN_PAGE_SIZE);
const _: () = assert!(DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
const _: () = assert!(MAX_PAGE_SIZE % PAGE_SIZE_MULTIPLE == 0);

pub const SUMMARY_PAGE_NUM: u64 = 0;
pub const FIRST_INVENTORY_PAGE_NUM: u64 = 1;

/// Bytes at the start of page 0 taken by the summary header.
pub const SUMMARY_HEADER_SIZE: usize = 64;
pub const INVENTORY_HEADER_SIZE: usize = 1;
pub const DIRECTORY_HEADER_SIZE: usize = 16;
pub const DIRECTORY_ENTRY_SIZE: usize = 16;

const _: () = assert!(SUMMARY_HEADER_SIZE <= MIN_PAGE_SIZE as usize);
const _: () = assert!(DIRECTORY_HEADER_SIZE + DIRECTORY_ENTRY_SIZE <= MIN_PAGE_SIZE as usize);

/// Table ids below this value are reserved for system tables.
pub const MIN_VERSIONED_TID: u32 = 4096;

pub const MAX_TRANSACTION_VERSION: u64 = u32::MAX as u64;
pub const MIN_PROPOSED_WRITE_VERSION: u64 = u64::MAX - u32::MAX as u64 - 1;
pub const PROPOSAL_VERSION: u64 = u64::MAX;

const _: () = assert!(MAX_TRANSACTION_VERSION < MIN_PROPOSED_WRITE_VERSION);
const _: () = assert!(MIN_PROPOSED_WRITE_VERSION + u32::MAX as u64 == PROPOSAL_VERSION - 1);

/// Top 16 bits of a row stamp are all ones while the writer is in progress.
pub const STAMP_IN_PROGRESS_MASK: u64 = 0xFFFF_0000_0000_0000;
pub const STAMP_TID_BITS: u32 = 24;
pub const STAMP_CID_BITS: u32 = 24;
pub const STAMP_MAX_TID: u32 = (1 << STAMP_TID_BITS) - 1;
pub const STAMP_MAX_CID: u32 = (1 << STAMP_CID_BITS) - 1;
/// Committed row versions must stay below the in-progress flag bits.
pub const MAX_COMMITTED_STAMP: u64 = !STAMP_IN_PROGRESS_MASK;

const _: () = assert!(STAMP_TID_BITS + STAMP_CID_BITS + 16 == 64);

/// Row codec: column indexes 0..=14 fit in the tag's high nibble.
pub const ROW_INLINE_COLUMN_LIMIT: usize = 15;
pub const ROW_EXTENDED_COLUMN_NIBBLE: u8 = 0xF;

pub const MAX_VARINT_LEN: usize = 10;
