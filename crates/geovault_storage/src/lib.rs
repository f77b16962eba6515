//! # Geovault Storage
//!
//! Row store contract and in-memory row store for geovault.
//!
//! This crate is the lowest layer of geovault. A row store keeps versioned
//! feature rows per table and is the single place where concurrent writers
//! are serialized. It knows nothing about layers, strategies or merges.
//!
//! ## Design Principles
//!
//! - Every row carries a `[version, next_version)` validity range
//! - The HEAD row of an id is the one with `next_version == MAX_VERSION`
//! - Retiring a HEAD row is a compare-and-swap on `next_version`
//! - Writes of the same shape execute as one batch, one result per tuple
//!
//! ## Available Stores
//!
//! - [`InMemoryRowStore`] - For testing and embedded use
//!
//! ## Example
//!
//! ```rust
//! use geovault_storage::{InMemoryRowStore, RetireGuard, RowStore};
//!
//! let store = InMemoryRowStore::with_tables(["roads"]);
//! let version = store.next_sequence("roads").unwrap();
//! let retired = store
//!     .retire_head("roads", "F1", RetireGuard::VersionBelow(version), version)
//!     .unwrap();
//! assert!(retired.is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod memory;
mod row;
mod statement;
mod stats;
mod store;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryRowStore;
pub use row::{Operation, Row, MAX_VERSION};
pub use statement::{
    DeletePredicate, RetireGuard, RowParams, RowResult, UpsertConflict, WriteStatement,
};
pub use stats::{StoreStats, StoreStatsSnapshot};
pub use store::RowStore;
