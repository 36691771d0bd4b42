//! # Transaction Management
//!
//! This module provides the transaction context consumed by the row store and
//! the sequencer that hands out transaction ids, snapshots and commit versions.
//!
//! ## Transaction Context
//!
//! A [`TxnContext`] is everything the row store needs to know about a caller:
//!
//! - `tid`: transaction id, stamped into uncommitted row versions
//! - `cid`: statement id, incremented once per executed statement
//! - `snapshot`: the newest committed version the transaction may read
//!
//! ## Version Assignment
//!
//! ```text
//! begin()  ──> snapshot = last committed version
//!    │
//!    ├─ next_statement() ──> cid += 1 (repeatable)
//!    │
//!    ├─ commit(finalize) ──> version = last committed + 1
//!    │                        finalize(version)   (stamp rows)
//!    │                        last committed = version
//!    │
//!    └─ abort()
//! ```
//!
//! The last committed version is published only after `finalize` has stamped
//! every row, under the commit lock. A transaction that begins afterwards sees
//! all rows of the commit; one that began before sees none of them.
//!
//! ## Concurrency Model
//!
//! - `next_tid`: lock-free, advanced only while below the stamp limit. Ids
//!   are never reused, so one manager hands out at most `STAMP_MAX_TID`
//!   (2^24 - 1) transactions; `begin` fails once they are spent
//! - `last_committed`: written under `commit_lock`, read lock-free
//! - Active set: small mutex-protected list, used for the GC watermark
//!
//! Maximum concurrent transactions: 64.

use eyre::{bail, ensure, eyre, Result};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::config::{STAMP_MAX_CID, STAMP_MAX_TID};

use super::stamp::RowStamp;
use super::version::{is_transaction, Version};

pub type TxnId = u32;
pub type StatementId = u32;

pub const MAX_CONCURRENT_TXNS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnContext {
    tid: TxnId,
    cid: StatementId,
    snapshot: Version,
}

impl TxnContext {
    pub fn new(tid: TxnId, cid: StatementId, snapshot: Version) -> Self {
        Self {
            tid,
            cid,
            snapshot,
        }
    }

    pub fn tid(&self) -> TxnId {
        self.tid
    }

    pub fn cid(&self) -> StatementId {
        self.cid
    }

    pub fn snapshot(&self) -> Version {
        self.snapshot
    }

    /// Starts the next statement; its writes become visible to later ones.
    pub fn next_statement(&mut self) -> Result<StatementId> {
        ensure!(
            self.cid < STAMP_MAX_CID,
            "transaction {} ran out of statement ids",
            self.tid
        );
        self.cid += 1;
        Ok(self.cid)
    }

    pub fn stamp(&self) -> Result<RowStamp> {
        RowStamp::in_progress(self.tid, self.cid)
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveTxn {
    tid: TxnId,
    snapshot: Version,
}

pub struct TransactionManager {
    next_tid: AtomicU32,
    last_committed: AtomicU64,
    commit_lock: Mutex<()>,
    active: Mutex<SmallVec<[ActiveTxn; 16]>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::with_last_committed(0)
    }

    /// Resumes the sequencer after a restart at a known committed version.
    pub fn with_last_committed(version: Version) -> Self {
        Self {
            next_tid: AtomicU32::new(1),
            last_committed: AtomicU64::new(version),
            commit_lock: Mutex::new(()),
            active: Mutex::new(SmallVec::new()),
        }
    }

    pub fn begin(&self) -> Result<TxnContext> {
        let mut active = self.active.lock();
        if active.len() >= MAX_CONCURRENT_TXNS {
            bail!(
                "too many concurrent transactions (max {})",
                MAX_CONCURRENT_TXNS
            );
        }

        let tid = self
            .next_tid
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |tid| {
                (tid <= STAMP_MAX_TID).then_some(tid + 1)
            })
            .map_err(|tid| {
                eyre!(
                    "transaction id space exhausted ({} > {})",
                    tid,
                    STAMP_MAX_TID
                )
            })?;

        let snapshot = self.last_committed.load(Ordering::Acquire);
        active.push(ActiveTxn { tid, snapshot });
        tracing::debug!(tid, snapshot, "begin transaction");
        Ok(TxnContext::new(tid, 0, snapshot))
    }

    /// Assigns the commit version and runs `finalize` with it before the
    /// version becomes visible to new snapshots.
    pub fn commit<F>(&self, ctx: &TxnContext, finalize: F) -> Result<Version>
    where
        F: FnOnce(Version) -> Result<()>,
    {
        let _guard = self.commit_lock.lock();
        let version = self.last_committed.load(Ordering::Acquire) + 1;
        ensure!(
            is_transaction(version),
            "committed version space exhausted"
        );

        finalize(version)?;

        self.last_committed.store(version, Ordering::Release);
        self.remove_active(ctx.tid);
        tracing::debug!(tid = ctx.tid, version, "commit transaction");
        Ok(version)
    }

    pub fn abort(&self, ctx: &TxnContext) {
        self.remove_active(ctx.tid);
        tracing::debug!(tid = ctx.tid, "abort transaction");
    }

    fn remove_active(&self, tid: TxnId) {
        let mut active = self.active.lock();
        if let Some(pos) = active.iter().position(|t| t.tid == tid) {
            active.swap_remove(pos);
        }
    }

    pub fn last_committed(&self) -> Version {
        self.last_committed.load(Ordering::Acquire)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Oldest snapshot any running transaction can read. Versions shadowed by a
    /// newer version at or below the watermark are unreachable.
    pub fn watermark(&self) -> Version {
        let active = self.active.lock();
        active
            .iter()
            .map(|t| t.snapshot)
            .min()
            .unwrap_or_else(|| self.last_committed.load(Ordering::Acquire))
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
