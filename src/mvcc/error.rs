//! # MVCC Error Classes
//!
//! Row-store operations return `eyre::Result`; the failures a caller has to
//! branch on are raised as [`MvccError`] so they can be recovered with
//! `report.downcast_ref::<MvccError>()`.
//!
//! - **Conflict** (`WriteConflict`, `StaleWrite`): the statement or the whole
//!   transaction may be retried. This layer never retries on its own.
//! - **Integrity** (`RowNotFound`, `NotOwner`, `ColumnOutOfRange`): caller bug
//!   or a row deleted underneath the caller; retrying will not help.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MvccError {
    #[error("write-write conflict on row {row}: held by transaction {holder}")]
    WriteConflict { row: usize, holder: u32 },

    #[error("row {row} changed at version {version}, after snapshot {snapshot}")]
    StaleWrite {
        row: usize,
        version: u64,
        snapshot: u64,
    },

    #[error("row {row} does not exist")]
    RowNotFound { row: usize },

    #[error("row {row} is not owned by transaction {tid}")]
    NotOwner { row: usize, tid: u32 },

    #[error("column {column} out of range for row of {arity} columns")]
    ColumnOutOfRange { column: usize, arity: usize },
}

impl MvccError {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            MvccError::WriteConflict { .. } | MvccError::StaleWrite { .. }
        )
    }
}

/// True when `report` carries a conflict-class [`MvccError`].
pub fn is_conflict(report: &eyre::Report) -> bool {
    report
        .downcast_ref::<MvccError>()
        .is_some_and(MvccError::is_conflict)
}
