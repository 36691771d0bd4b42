//! # Row Stamps
//!
//! Every node of a row's version chain carries a 64-bit stamp that is either
//! the committed version of the node or, while its writer is still running,
//! the writer's transaction and statement ids.
//!
//! ```text
//! committed:    0x0000_VVVV_VVVV_VVVV      version < 2^48
//!
//! in progress:  0xFFFF_TTTT_TTCC_CCCC
//!               │      │      └─ cid: 24-bit statement id
//!               │      └─ tid: 24-bit transaction id
//!               └─ all ones: writer has not committed
//! ```
//!
//! Commit rewrites an in-progress stamp into a committed one; the values of
//! the node are not touched.

use std::fmt;

use eyre::{ensure, Result};

use crate::config::{
    MAX_COMMITTED_STAMP, STAMP_CID_BITS, STAMP_IN_PROGRESS_MASK, STAMP_MAX_CID, STAMP_MAX_TID,
};

use super::Version;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowStamp(u64);

impl RowStamp {
    pub fn committed(version: Version) -> Result<Self> {
        ensure!(
            version <= MAX_COMMITTED_STAMP,
            "committed version {:#x} does not fit in a row stamp",
            version
        );
        Ok(Self(version))
    }

    pub fn in_progress(tid: u32, cid: u32) -> Result<Self> {
        ensure!(
            tid <= STAMP_MAX_TID,
            "transaction id {} exceeds {}",
            tid,
            STAMP_MAX_TID
        );
        ensure!(
            cid <= STAMP_MAX_CID,
            "statement id {} exceeds {}",
            cid,
            STAMP_MAX_CID
        );
        Ok(Self(
            STAMP_IN_PROGRESS_MASK | ((tid as u64) << STAMP_CID_BITS) | cid as u64,
        ))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_in_progress(self) -> bool {
        self.0 & STAMP_IN_PROGRESS_MASK == STAMP_IN_PROGRESS_MASK
    }

    pub fn tid(self) -> Option<u32> {
        self.is_in_progress()
            .then(|| ((self.0 >> STAMP_CID_BITS) as u32) & STAMP_MAX_TID)
    }

    pub fn cid(self) -> Option<u32> {
        self.is_in_progress()
            .then(|| (self.0 as u32) & STAMP_MAX_CID)
    }

    pub fn version(self) -> Option<Version> {
        (!self.is_in_progress()).then_some(self.0)
    }
}

impl fmt::Debug for RowStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.tid(), self.cid()) {
            (Some(tid), Some(cid)) => write!(f, "RowStamp(tid={}, cid={})", tid, cid),
            _ => write!(f, "RowStamp(v={})", self.0),
        }
    }
}
