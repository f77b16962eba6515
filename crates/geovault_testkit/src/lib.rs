//! # Geovault Testkit
//!
//! Test utilities for geovault.
//!
//! This crate provides:
//! - Test spaces backed by the in-memory row store
//! - Property-based test generators using proptest
//! - A model harness that tracks expected feature states
//! - Checks of the storage invariants
//! - Stress testing utilities
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use geovault_core::{Feature, UpdateStrategy};
//! use geovault_testkit::prelude::*;
//!
//! with_space(|space| {
//!     space
//!         .write_feature(Feature::new("F1"), None, &UpdateStrategy::new(), &[])
//!         .unwrap();
//!     check_version_ranges(space.store().as_ref(), "roads", "F1");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod logging;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::logging::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
pub use logging::*;
pub use stress::*;
