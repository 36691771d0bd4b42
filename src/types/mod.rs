//! # Value and Column Types
//!
//! The storage core works on a closed set of scalar types. Every codec
//! boundary matches exhaustively on [`Value`]; there is no dynamic dispatch
//! over values anywhere in the crate.
//!
//! | Type | Purpose |
//! |------|---------|
//! | `Value` | Owned scalar: NULL, BOOL, INT, FLOAT, TEXT, BLOB |
//! | `ColumnType` | Declared type of a table column |
//! | `ColumnDef` | Column name plus type, supplied by the catalog |

mod column;
mod value;

pub use column::{ColumnDef, ColumnType};
pub use value::Value;
