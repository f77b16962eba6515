//! # Geovault Diff
//!
//! Structural diff, patch and conflict detection over JSON trees.
//!
//! Every function in this crate is pure: inputs are borrowed, results are
//! fresh trees. Feature properties are dynamically shaped, so everything
//! operates on [`serde_json::Value`].
//!
//! ## Rules
//!
//! - A diff is an object; `null` means "remove this key"
//! - Objects are diffed recursively, arrays and scalars are replaced whole
//! - Ignored paths (see [`DiffOptions`]) never show up in a diff or conflict
//! - A 2D coordinate equals its 3D counterpart with zero altitude
//!
//! ## Usage
//!
//! ```
//! use geovault_diff::{diff, patch, DiffOptions};
//! use serde_json::json;
//!
//! let before = json!({"properties": {"name": "Main St"}});
//! let after = json!({"properties": {"name": "Main Street", "lanes": 2}});
//!
//! let change = diff(&before, &after, &DiffOptions::new());
//! assert_eq!(patch(&before, &change), after);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod diff;
mod options;
mod patch;

pub use conflict::{find_conflicts, merge, Conflict};
pub use diff::diff;
pub use options::{DiffOptions, COORDINATES_PATH, VOLATILE_META_FIELDS};
pub use patch::patch;
