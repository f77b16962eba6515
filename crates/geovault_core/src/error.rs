//! Error types for the write engine.

use geovault_diff::Conflict;
use geovault_storage::{Operation, StorageError};
use std::fmt;
use thiserror::Error;

/// Result type for write operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Stable machine readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed request.
    IllegalArgument,
    /// Invalid engine configuration.
    InvalidConfig,
    /// The feature exists but must not.
    FeatureExists,
    /// The feature does not exist but must.
    FeatureNotExists,
    /// Optimistic concurrency failure.
    VersionConflict,
    /// Unresolved three-way merge.
    MergeConflict,
    /// The row store failed.
    Storage,
}

impl ErrorCode {
    /// Returns the code as an upper snake case string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::IllegalArgument => "ILLEGAL_ARGUMENT",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::FeatureExists => "FEATURE_EXISTS",
            ErrorCode::FeatureNotExists => "FEATURE_NOT_EXISTS",
            ErrorCode::VersionConflict => "VERSION_CONFLICT",
            ErrorCode::MergeConflict => "MERGE_CONFLICT",
            ErrorCode::Storage => "STORAGE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while writing features.
///
/// All errors except [`WriteError::Storage`] are terminal for the single
/// feature being written; sibling features of the same request are not
/// affected unless the caller stops on the first error.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The request is malformed.
    #[error("illegal argument: {message}")]
    IllegalArgument {
        /// What was wrong.
        message: String,
    },

    /// The engine configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong.
        message: String,
    },

    /// The feature exists and the strategy forbids that.
    #[error("feature with id {} exists, cannot {}", .id, verb(.operation))]
    FeatureExists {
        /// Feature id.
        id: String,
        /// Attempted operation.
        operation: Operation,
        /// The store's uniqueness violation, if that is how it was detected.
        #[source]
        source: Option<StorageError>,
    },

    /// The feature does not exist and the strategy requires it.
    #[error("feature with id {} does not exist, cannot {}", .id, verb(.operation))]
    FeatureNotExists {
        /// Feature id.
        id: String,
        /// Attempted operation.
        operation: Operation,
    },

    /// The HEAD version is not the version the change was based on.
    #[error(
        "version conflict while trying to {} feature with id {}: base version {}, HEAD version {}",
        verb(.operation), .id, version(.base_version), version(.head_version)
    )]
    VersionConflict {
        /// Feature id.
        id: String,
        /// Attempted operation.
        operation: Operation,
        /// Version the change was based on.
        base_version: Option<i64>,
        /// Version of the HEAD row at the time of the conflict.
        head_version: Option<i64>,
    },

    /// The incoming change and the HEAD change touch the same attributes.
    #[error(
        "merge conflict while trying to {} feature with id {}: {}",
        verb(.operation), .id, list(.conflicts)
    )]
    MergeConflict {
        /// Feature id.
        id: String,
        /// Attempted operation.
        operation: Operation,
        /// Every conflicting path with both values.
        conflicts: Vec<Conflict>,
    },

    /// The row store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

fn verb(operation: &Operation) -> &'static str {
    operation.verb()
}

fn version(version: &Option<i64>) -> String {
    version.map_or_else(|| "none".to_string(), |v| v.to_string())
}

fn list(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl WriteError {
    /// Creates an illegal argument error.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns the machine readable error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            WriteError::IllegalArgument { .. } => ErrorCode::IllegalArgument,
            WriteError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            WriteError::FeatureExists { .. } => ErrorCode::FeatureExists,
            WriteError::FeatureNotExists { .. } => ErrorCode::FeatureNotExists,
            WriteError::VersionConflict { .. } => ErrorCode::VersionConflict,
            WriteError::MergeConflict { .. } => ErrorCode::MergeConflict,
            WriteError::Storage(_) => ErrorCode::Storage,
        }
    }

    /// Returns a hint on how a client can resolve the error.
    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            WriteError::IllegalArgument { .. } => "Check the request parameters.".into(),
            WriteError::InvalidConfig { .. } => "Check the engine configuration.".into(),
            WriteError::FeatureExists { .. } => {
                "Use onExists=REPLACE to overwrite the existing feature.".into()
            }
            WriteError::FeatureNotExists { .. } => {
                "Use onNotExists=CREATE to create the feature.".into()
            }
            WriteError::VersionConflict { head_version, .. } => match head_version {
                Some(head) => format!(
                    "Resubmit the change with base version {head}, or use onVersionConflict=REPLACE."
                ),
                None => "Reload the feature and resubmit the change.".into(),
            },
            WriteError::MergeConflict { conflicts, .. } => format!(
                "Resolve the {} conflicting attribute(s) manually, or use onMergeConflict=REPLACE.",
                conflicts.len()
            ),
            WriteError::Storage(_) => "Retry the request; the row store reported a failure.".into(),
        }
    }

    /// Returns the id of the feature the error refers to.
    #[must_use]
    pub fn feature_id(&self) -> Option<&str> {
        match self {
            WriteError::FeatureExists { id, .. }
            | WriteError::FeatureNotExists { id, .. }
            | WriteError::VersionConflict { id, .. }
            | WriteError::MergeConflict { id, .. } => Some(id),
            WriteError::IllegalArgument { .. }
            | WriteError::InvalidConfig { .. }
            | WriteError::Storage(_) => None,
        }
    }

    /// Returns true if resubmitting with fresh data can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WriteError::VersionConflict { .. } | WriteError::MergeConflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::error::Error as _;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::VersionConflict.as_str(), "VERSION_CONFLICT");
        assert_eq!(
            WriteError::illegal_argument("x").code().to_string(),
            "ILLEGAL_ARGUMENT"
        );
    }

    #[test]
    fn version_conflict_names_both_versions() {
        let err = WriteError::VersionConflict {
            id: "F1".into(),
            operation: Operation::Update,
            base_version: Some(5),
            head_version: Some(7),
        };
        let msg = err.to_string();
        assert!(msg.contains("update"));
        assert!(msg.contains("F1"));
        assert!(msg.contains("base version 5"));
        assert!(msg.contains("HEAD version 7"));
        assert!(err.is_retryable());
        assert_eq!(err.feature_id(), Some("F1"));
        assert!(err.hint().contains('7'));
    }

    #[test]
    fn merge_conflict_lists_paths() {
        let err = WriteError::MergeConflict {
            id: "F1".into(),
            operation: Operation::Update,
            conflicts: vec![Conflict {
                path: "properties.name".into(),
                ours: json!("a"),
                theirs: json!("b"),
            }],
        };
        assert!(err
            .to_string()
            .contains(r#"properties.name: "a" <> "b""#));
    }

    #[test]
    fn feature_exists_keeps_cause() {
        let err = WriteError::FeatureExists {
            id: "F1".into(),
            operation: Operation::Insert,
            source: Some(StorageError::UniqueViolation {
                table: "roads".into(),
                id: "F1".into(),
            }),
        };
        assert_eq!(err.code(), ErrorCode::FeatureExists);
        assert!(err.source().is_some());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("cannot insert"));
    }
}
