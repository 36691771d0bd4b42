//! # Configuration Module
//!
//! This module centralizes the configuration constants of the storage core.
//! Constants are grouped by their functional area and interdependencies are
//! documented and enforced through compile-time assertions.
//!
//! Runtime configuration (file path, page size of a new file, create-if-missing)
//! lives on [`crate::storage::FileStoreBuilder`]; everything here is fixed at
//! compile time because it is part of the on-disk or in-key format.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency documentation

pub mod constants;
pub use constants::*;
