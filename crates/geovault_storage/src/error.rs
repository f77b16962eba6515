//! Error types for row store operations.

use thiserror::Error;

/// Result type for row store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during row store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The unique constraint on `(id, next_version)` was violated.
    #[error("unique violation on ({id}, next_version) in table {table}")]
    UniqueViolation {
        /// Table the row was written to.
        table: String,
        /// Feature id of the conflicting row.
        id: String,
    },

    /// The table does not exist in the store.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The parameters do not fit the statement they were queued for.
    #[error("invalid parameters for {statement}: {message}")]
    InvalidParams {
        /// Statement name.
        statement: &'static str,
        /// What was wrong.
        message: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("payload codec error: {0}")]
    Codec(String),

    /// The stored data violates a store invariant.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Returns true if this is the store's native uniqueness-violation signal.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StorageError::UniqueViolation { .. })
    }

    pub(crate) fn invalid_params(statement: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            statement,
            message: message.into(),
        }
    }
}
