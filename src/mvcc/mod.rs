//! # Multi-Version Concurrency Control (MVCC)
//!
//! This module implements snapshot isolation for in-memory tables. Readers
//! never block writers: every row is a chain of versions and a reader walks the
//! chain until it finds the newest version its snapshot may see.
//!
//! ## Transaction Lifecycle
//!
//! ```text
//! begin() ─────> Active ─────> commit(version) ─────> Committed
//!                  │                                     │
//!                  │                                     v
//!                  └──> rollback() ───> Aborted          └──> rows stamped
//! ```
//!
//! ## Visibility Rules
//!
//! A version V is visible to a transaction T if either:
//! 1. V was written by T in an earlier statement (`V.cid != T.cid`), or
//! 2. V is committed and `V.version <= T.snapshot`.
//!
//! A visible version with no values is a tombstone: the row is deleted for T.
//!
//! ## Conflicts
//!
//! A writer fails instead of waiting when the row's newest version belongs to
//! another running transaction, or was committed after the writer's snapshot.
//! Both cases surface as [`MvccError`] values whose `is_conflict()` is true;
//! the retry policy belongs to the caller.
//!
//! ## Key Structures
//!
//! - `Version`: u64 in one of the namespaces of [`version`]
//! - `RowStamp`: committed version or in-progress `{tid, cid}` of a row version
//! - `TxnContext`: `{tid, cid, snapshot}` of the caller
//! - `TransactionManager`: sequencer for tids, snapshots and commit versions
//! - `MvccTable`: arena of version chains with per-transaction write sets

pub mod error;
pub mod stamp;
pub mod table;
pub mod transaction;
pub mod version;

pub use error::{is_conflict, MvccError};
pub use stamp::RowStamp;
pub use table::{MvccTable, RowIndex};
pub use transaction::{
    StatementId, TransactionManager, TxnContext, TxnId, MAX_CONCURRENT_TXNS,
};
pub use version::{Version, VersionKind, PROPOSAL};
