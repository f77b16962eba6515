//! # Geovault Core
//!
//! Versioned feature write engine for geovault.
//!
//! This crate provides:
//! - The GeoJSON feature model with its reserved metadata
//! - Update strategies for existing, missing and concurrently changed features
//! - The Feature Writer state machine with three-way merges
//! - Batched execution of row writes
//! - Aggregation of write outcomes into feature collections
//! - History retention
//!
//! ## Layers
//!
//! A space is a chain of tables, most base first. Writes go to the top
//! layer of the configured [`SpaceContext`]; reads search down the chain
//! and stop at the first layer holding the id.
//!
//! ## Concurrency
//!
//! The engine takes no locks. Writers racing for the same feature are
//! serialized by the compare-and-swap of the row store; the loser ends up
//! in version conflict handling.
//!
//! ## Example
//!
//! ```rust
//! use geovault_core::{
//!     EngineConfig, Feature, LayerChain, UpdateStrategy, VersionConflictPolicy, WriteEngine,
//! };
//! use geovault_storage::InMemoryRowStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryRowStore::with_tables(["roads"]));
//! let engine = WriteEngine::new(store, EngineConfig::new(LayerChain::single("roads"))).unwrap();
//!
//! let created = engine
//!     .write_feature(Feature::new("F1").with_property("lanes", 2), Some("alice"), &UpdateStrategy::new(), &[])
//!     .unwrap()
//!     .unwrap();
//!
//! let strategy = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Error);
//! let change = Feature::new("F1")
//!     .with_property("lanes", 3)
//!     .with_base_version(created.version);
//! assert!(engine.write_feature(change.clone(), Some("bob"), &strategy, &[]).is_ok());
//! assert!(engine.write_feature(change, Some("carol"), &strategy, &[]).is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod engine;
mod error;
mod feature;
mod layer;
mod modification;
mod outcome;
mod retention;
mod strategy;
mod writer;

pub use batch::{BatchedExecutor, ResultHandler};
pub use config::{EngineConfig, ErrorPolicy, ExecutionMode, RetentionPolicy, DEFAULT_AUTHOR};
pub use engine::{Hook, WriteEngine};
pub use error::{ErrorCode, WriteError, WriteResult};
pub use feature::{random_id, Feature, FeatureMeta, CREATED_AT_POINTER, META_NAMESPACE};
pub use layer::{ChainSlice, Layer, LayerChain, SpaceContext};
pub use modification::{FeatureModification, ModificationPayload};
pub use outcome::{Action, FailedWrite, FeatureCollection, WriteOutcome};
pub use retention::{HistoryMaintainer, MaintenanceReport};
pub use strategy::{
    ExistsPolicy, MergeConflictPolicy, NotExistsPolicy, UpdateStrategy, VersionConflictPolicy,
};
