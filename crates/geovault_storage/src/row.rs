//! Persisted row model.

use serde_json::Value;
use std::fmt;

/// Sentinel `next_version` of the row that is currently valid (HEAD).
pub const MAX_VERSION: i64 = i64::MAX;

/// Operation code recorded with every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// The feature was created.
    Insert,
    /// The feature was updated.
    Update,
    /// The feature was deleted (tombstone).
    Delete,
    /// A fresh tombstone hiding a feature of a base layer.
    HistoryDelete,
    /// An update that also hides or reveals a base-layer state.
    Join,
}

impl Operation {
    /// Returns the single character code stored in the operation column.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Operation::Insert => 'I',
            Operation::Update => 'U',
            Operation::Delete => 'D',
            Operation::HistoryDelete => 'H',
            Operation::Join => 'J',
        }
    }

    /// Parses an operation code.
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            'I' => Some(Operation::Insert),
            'U' => Some(Operation::Update),
            'D' => Some(Operation::Delete),
            'H' => Some(Operation::HistoryDelete),
            'J' => Some(Operation::Join),
            _ => None,
        }
    }

    /// Maps an insert-like operation onto its update counterpart.
    ///
    /// `Insert`/`Update` become `Update`, the layer-aware operations become `Join`.
    #[must_use]
    pub const fn to_update(self) -> Self {
        match self {
            Operation::Insert | Operation::Update => Operation::Update,
            Operation::HistoryDelete | Operation::Join | Operation::Delete => Operation::Join,
        }
    }

    /// Human readable verb used in error messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Operation::Insert | Operation::HistoryDelete => "insert",
            Operation::Update | Operation::Join => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One persisted version of a feature.
///
/// A row is HEAD for its id iff `next_version == MAX_VERSION`. The history of
/// an id is the ordered set of its rows with non-overlapping
/// `[version, next_version)` ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Feature id.
    pub id: String,
    /// First version this row is valid for.
    pub version: i64,
    /// Exclusive upper bound of validity.
    pub next_version: i64,
    /// Operation that produced the row.
    pub operation: Operation,
    /// Author of the change.
    pub author: String,
    /// Feature payload without geometry.
    pub payload: Value,
    /// Geometry, stored separately from the payload.
    pub geometry: Option<Value>,
}

impl Row {
    /// Creates a new HEAD row.
    pub fn head(
        id: impl Into<String>,
        version: i64,
        operation: Operation,
        author: impl Into<String>,
        payload: Value,
        geometry: Option<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            version,
            next_version: MAX_VERSION,
            operation,
            author: author.into(),
            payload,
            geometry,
        }
    }

    /// Returns true if this row is the current state of its id.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.next_version == MAX_VERSION
    }

    /// Returns true if `version` falls into `[version, next_version)`.
    #[must_use]
    pub fn is_valid_at(&self, version: i64) -> bool {
        self.version <= version && version < self.next_version
    }
}
