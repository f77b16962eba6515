//! Write statements, their parameter tuples and per-tuple results.
//!
//! A [`WriteStatement`] describes the *shape* of a write (which table, which
//! conflict action). Many [`RowParams`] tuples can be executed against one
//! statement in a single round trip via [`crate::RowStore::execute`].

use crate::row::{Operation, Row};
use serde_json::Value;

/// Guard of the conditional HEAD retirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetireGuard {
    /// Only retire if the HEAD row has exactly this version.
    VersionEquals(i64),
    /// Only retire if the HEAD row is older than this version.
    VersionBelow(i64),
}

impl RetireGuard {
    /// Checks the guard against the version of a HEAD row.
    #[must_use]
    pub fn accepts(self, head_version: i64) -> bool {
        match self {
            RetireGuard::VersionEquals(expected) => head_version == expected,
            RetireGuard::VersionBelow(bound) => head_version < bound,
        }
    }
}

/// Action taken by an upsert when a HEAD row already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsertConflict {
    /// Overwrite the HEAD row, keeping the preserved payload value.
    Replace,
    /// Keep the HEAD row untouched.
    Retain,
    /// Surface the uniqueness violation.
    Error,
}

/// Which rows a delete statement may remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletePredicate {
    /// Every row of the id.
    AllVersions,
    /// Only the HEAD row.
    HeadOnly,
    /// Only the row with the expected version of the tuple.
    VersionEquals,
}

/// The shape of a batched write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WriteStatement {
    /// Append a new HEAD row (history mode).
    InsertHistoryRow {
        /// Target table.
        table: String,
        /// JSON pointer into the payload whose value is taken from the
        /// previous version of the id, if one exists.
        preserve: Option<String>,
    },
    /// Insert a HEAD row or resolve the collision with an existing one.
    UpsertRow {
        /// Target table.
        table: String,
        /// Conflict action.
        on_conflict: UpsertConflict,
        /// JSON pointer into the payload kept from the replaced row.
        preserve: Option<String>,
    },
    /// Overwrite the HEAD row if it has the expected version.
    UpdateRow {
        /// Target table.
        table: String,
        /// JSON pointer into the payload kept from the replaced row.
        preserve: Option<String>,
    },
    /// Delete rows of an id.
    DeleteRow {
        /// Target table.
        table: String,
        /// Row selection.
        predicate: DeletePredicate,
    },
}

impl WriteStatement {
    /// Returns the table the statement writes to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            WriteStatement::InsertHistoryRow { table, .. }
            | WriteStatement::UpsertRow { table, .. }
            | WriteStatement::UpdateRow { table, .. }
            | WriteStatement::DeleteRow { table, .. } => table,
        }
    }

    /// Returns a short statement name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            WriteStatement::InsertHistoryRow { .. } => "insert_history_row",
            WriteStatement::UpsertRow { .. } => "upsert_row",
            WriteStatement::UpdateRow { .. } => "update_row",
            WriteStatement::DeleteRow { .. } => "delete_row",
        }
    }
}

/// One parameter tuple of a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RowParams {
    /// The row to write. For deletes only `id` is read.
    pub row: Row,
    /// Expected version for `UpdateRow` and `DeleteRow { VersionEquals }`.
    pub expected_version: Option<i64>,
}

impl RowParams {
    /// Parameters for an insert or upsert.
    #[must_use]
    pub fn write(row: Row) -> Self {
        Self {
            row,
            expected_version: None,
        }
    }

    /// Parameters for a conditional update.
    #[must_use]
    pub fn update(row: Row, expected_version: i64) -> Self {
        Self {
            row,
            expected_version: Some(expected_version),
        }
    }

    /// Parameters for a delete.
    pub fn delete(id: impl Into<String>, expected_version: Option<i64>) -> Self {
        Self {
            row: Row::head(id, 0, Operation::Delete, "", Value::Null, None),
            expected_version,
        }
    }
}

/// Result of one parameter tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum RowResult {
    /// A new row was appended.
    Inserted {
        /// Value found at the preserve pointer of the previous version.
        preserved: Option<Value>,
    },
    /// An upsert wrote a row.
    Upserted {
        /// Operation recorded on the HEAD row after the write.
        operation: Operation,
        /// Value kept at the preserve pointer, if the HEAD row was replaced.
        preserved: Option<Value>,
    },
    /// An upsert with `Retain` hit an existing HEAD row.
    Skipped,
    /// An update matched its expected version.
    Updated {
        /// Value kept at the preserve pointer.
        preserved: Option<Value>,
    },
    /// An update did not match any row.
    NotMatched,
    /// Number of rows removed by a delete.
    Deleted(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retire_guard_semantics() {
        assert!(RetireGuard::VersionEquals(5).accepts(5));
        assert!(!RetireGuard::VersionEquals(5).accepts(6));
        assert!(RetireGuard::VersionBelow(5).accepts(4));
        assert!(!RetireGuard::VersionBelow(5).accepts(5));
    }

    #[test]
    fn statements_group_by_shape() {
        let a = WriteStatement::DeleteRow {
            table: "t".into(),
            predicate: DeletePredicate::VersionEquals,
        };
        let b = WriteStatement::DeleteRow {
            table: "t".into(),
            predicate: DeletePredicate::AllVersions,
        };
        assert_ne!(a, b);
        assert_eq!(a.table(), "t");
        assert_eq!(a.name(), "delete_row");
    }
}
