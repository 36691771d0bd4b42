//! # Storage Engines
//!
//! The planner talks to tables only through the [`Table`] and [`Rows`]
//! traits. An [`Engine`] creates and looks up tables; engines are found by
//! name in an [`EngineRegistry`] that the application builds at startup and
//! passes to whoever needs it.
//!
//! ```text
//! EngineRegistry ── "memory" ──> MemEngine ── table 4096 ──> MemTable
//!                                                              │
//!                     rows(ctx, 0, usize::MAX) <───────────────┘
//!                              │
//!                              ▼
//!                     Rows::next(dest) / update / delete / close
//! ```
//!
//! ## Row Ranges
//!
//! `rows(ctx, min_row, max_row)` visits row indexes in `min_row..=max_row`
//! in ascending order, skipping rows that are absent or invisible to `ctx`.
//! Pass `usize::MAX` as `max_row` for an unbounded scan.
//!
//! ## Transactions
//!
//! Every call carries the caller's [`TxnContext`]. A table remembers which rows
//! each transaction wrote; `commit` and `rollback` finish them all at once.

pub mod memory;
pub mod registry;

use std::sync::Arc;

use eyre::Result;

use crate::mvcc::{TxnContext, Version};
use crate::types::{ColumnDef, ColumnType, Value};

pub use memory::{MemEngine, MemRows, MemTable};
pub use registry::EngineRegistry;

pub trait Table: Send + Sync {
    fn table_id(&self) -> u32;

    fn columns(&self) -> Vec<&str>;

    fn column_types(&self) -> Vec<ColumnType>;

    fn rows<'a>(
        &'a self,
        ctx: &TxnContext,
        min_row: usize,
        max_row: usize,
    ) -> Result<Box<dyn Rows + 'a>>;

    fn insert(&self, ctx: &TxnContext, row: Vec<Value>) -> Result<()>;

    /// Stamps every row written by `ctx` with `version`.
    fn commit(&self, ctx: &TxnContext, version: Version) -> Result<usize>;

    fn rollback(&self, ctx: &TxnContext) -> Result<usize>;
}

/// Cursor over the visible rows of a table.
pub trait Rows {
    /// Copies the next visible row into `dest`. Returns false at the end.
    fn next(&mut self, dest: &mut [Value]) -> Result<bool>;

    /// Deletes the row last returned by `next`.
    fn delete(&mut self) -> Result<()>;

    /// Overwrites columns of the row last returned by `next`.
    fn update(&mut self, updates: &[(usize, Value)]) -> Result<()>;

    fn close(&mut self);
}

pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    fn create_table(&self, table_id: u32, columns: Vec<ColumnDef>) -> Result<Arc<dyn Table>>;

    fn table(&self, table_id: u32) -> Option<Arc<dyn Table>>;

    fn table_ids(&self) -> Vec<u32>;
}
