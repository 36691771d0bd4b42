//! # Maho - Transactional Storage Core
//!
//! Maho is the storage core of an embedded SQL database. It provides the
//! pieces a query planner needs below the SQL layer:
//!
//! - **Order-preserving keys**: byte-comparable encodings of typed tuples, so a
//!   plain ordered byte store can serve as a table or index
//! - **Compact rows**: sparse, tagged row encoding where NULL costs nothing
//! - **Snapshot isolation**: multi-version row chains with statement-level
//!   visibility and write-write conflict detection
//! - **Paged files**: memory-mapped database file with allocation bitmaps and
//!   a table directory
//!
//! ## Quick Start
//!
//! ```ignore
//! use maho::engine::{EngineRegistry, Table};
//! use maho::mvcc::TransactionManager;
//! use maho::types::{ColumnDef, ColumnType, Value};
//!
//! let engines = EngineRegistry::with_defaults()?;
//! let table = engines.require("memory")?.create_table(
//!     4096,
//!     vec![ColumnDef::new("id", ColumnType::Int), ColumnDef::new("name", ColumnType::Text)],
//! )?;
//!
//! let txns = TransactionManager::new();
//! let ctx = txns.begin()?;
//! table.insert(&ctx, vec![Value::Int(1), Value::from("Alice")])?;
//! txns.commit(&ctx, |version| table.commit(&ctx, version).map(|_| ()))?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Planner (outside this crate)      │
//! ├─────────────────────────────────────┤
//! │   engine: Table / Rows / registry   │
//! ├──────────────────┬──────────────────┤
//! │  mvcc: versions, │  encoding: keys, │
//! │  stamps, tables  │  rows, varints   │
//! ├──────────────────┴──────────────────┤
//! │   storage: summary, inventory,      │
//! │   directory over memmap2            │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`]: format constants with compile-time checks
//! - [`types`]: `Value`, `ColumnType`, `ColumnDef`
//! - [`encoding`]: key, row and varint codecs
//! - [`mvcc`]: version namespace, row stamps, transaction manager, row store
//! - [`engine`]: table and cursor traits, in-memory engine, engine registry
//! - [`storage`]: paged database file
//!
//! ## Errors and Logging
//!
//! Fallible operations return `eyre::Result`. Errors a caller must branch on
//! (`mvcc::MvccError`, `storage::FormatError`) travel inside the report and
//! are recovered with `downcast_ref`. Events are emitted with `tracing`; the
//! crate never installs a subscriber.

#[macro_use]
mod macros;

pub mod config;
pub mod encoding;
pub mod engine;
pub mod mvcc;
pub mod storage;
pub mod types;

pub use engine::{Engine, EngineRegistry, Rows, Table};
pub use mvcc::{MvccError, TransactionManager, TxnContext};
pub use storage::{FileStore, FormatError};
pub use types::{ColumnDef, ColumnType, Value};
