//! # Version Namespace
//!
//! Versions are `u64` values partitioned into disjoint ranges. The key codec
//! stores them in `Version` suffixes; the row store stamps committed rows with
//! values from the first range.
//!
//! ```text
//! 0 ..= u32::MAX                           transaction (committed) versions
//! u32::MAX + 1 .. MIN_PROPOSED_WRITE        unassigned
//! MIN_PROPOSED_WRITE ..= u64::MAX - 1       proposed writes, one per stmt id
//! u64::MAX                                  PROPOSAL (not yet committed)
//! ```
//!
//! `is_transaction`, `is_proposed_write` and `is_proposal` never hold for the
//! same value.

use eyre::{ensure, Result};

use crate::config::{MAX_TRANSACTION_VERSION, MIN_PROPOSED_WRITE_VERSION, PROPOSAL_VERSION};

pub type Version = u64;

pub const PROPOSAL: Version = PROPOSAL_VERSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    Transaction(u32),
    ProposedWrite(u32),
    Proposal,
    Unassigned,
}

#[inline]
pub fn make_transaction_version(tx_id: u32) -> Version {
    tx_id as Version
}

#[inline]
pub fn is_transaction(version: Version) -> bool {
    version <= MAX_TRANSACTION_VERSION
}

#[inline]
pub fn make_proposed_write_version(stmt_id: u32) -> Version {
    MIN_PROPOSED_WRITE_VERSION + stmt_id as Version
}

#[inline]
pub fn is_proposed_write(version: Version) -> bool {
    (MIN_PROPOSED_WRITE_VERSION..PROPOSAL).contains(&version)
}

pub fn proposed_write_stmt_id(version: Version) -> Result<u32> {
    ensure!(
        is_proposed_write(version),
        "version {:#x} is not a proposed-write version",
        version
    );
    Ok((version - MIN_PROPOSED_WRITE_VERSION) as u32)
}

#[inline]
pub fn is_proposal(version: Version) -> bool {
    version == PROPOSAL
}

pub fn classify(version: Version) -> VersionKind {
    if is_transaction(version) {
        VersionKind::Transaction(version as u32)
    } else if is_proposal(version) {
        VersionKind::Proposal
    } else if is_proposed_write(version) {
        VersionKind::ProposedWrite((version - MIN_PROPOSED_WRITE_VERSION) as u32)
    } else {
        VersionKind::Unassigned
    }
}
