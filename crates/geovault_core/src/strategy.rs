//! Update strategies.

use crate::error::{WriteError, WriteResult};

/// What to do when the feature already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistsPolicy {
    /// Overwrite it.
    #[default]
    Replace,
    /// Keep it and skip the write.
    Retain,
    /// Fail with [`WriteError::FeatureExists`].
    Error,
    /// Delete it instead of writing.
    Delete,
}

/// What to do when the feature does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotExistsPolicy {
    /// Create it.
    #[default]
    Create,
    /// Skip the write.
    Retain,
    /// Fail with [`WriteError::FeatureNotExists`].
    Error,
}

/// What to do when the HEAD version differs from the base version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionConflictPolicy {
    /// Write anyway.
    Replace,
    /// Keep HEAD and skip the write.
    Retain,
    /// Fail with [`WriteError::VersionConflict`].
    Error,
    /// Three-way merge the change into HEAD. Requires history.
    Merge,
}

impl VersionConflictPolicy {
    /// Returns the policy used when conflict detection is requested without
    /// naming one: merge for writes, replace for deletes.
    #[must_use]
    pub const fn default_for(is_delete: bool) -> Self {
        if is_delete {
            VersionConflictPolicy::Replace
        } else {
            VersionConflictPolicy::Merge
        }
    }
}

/// What to do when a merge leaves conflicting attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeConflictPolicy {
    /// Fail with [`WriteError::MergeConflict`].
    #[default]
    Error,
    /// Write the incoming feature over HEAD.
    Replace,
    /// Keep HEAD and skip the write.
    Retain,
    /// Write the incoming feature and mark it conflicting.
    Continue,
}

/// How a write treats the current state of the feature.
///
/// # Example
///
/// ```rust
/// use geovault_core::{ExistsPolicy, NotExistsPolicy, UpdateStrategy, VersionConflictPolicy};
///
/// let strategy = UpdateStrategy::new()
///     .on_exists(ExistsPolicy::Retain)
///     .on_version_conflict(VersionConflictPolicy::Error);
/// assert_eq!(strategy.not_exists_policy(), NotExistsPolicy::Create);
/// assert_eq!(UpdateStrategy::partial().not_exists_policy(), NotExistsPolicy::Error);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateStrategy {
    /// Policy for existing features.
    pub on_exists: ExistsPolicy,
    /// Policy for missing features; `None` picks the default.
    pub on_not_exists: Option<NotExistsPolicy>,
    /// Policy for version conflicts; `None` disables detection unless
    /// `detect_conflicts` is set.
    pub on_version_conflict: Option<VersionConflictPolicy>,
    /// Detect version conflicts with the default policy.
    pub detect_conflicts: bool,
    /// Policy for merge conflicts.
    pub on_merge_conflict: MergeConflictPolicy,
    /// The incoming features are patches, not full states.
    pub partial: bool,
}

impl UpdateStrategy {
    /// Creates the default strategy: replace or create, no conflict detection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            on_exists: ExistsPolicy::Replace,
            on_not_exists: None,
            on_version_conflict: None,
            detect_conflicts: false,
            on_merge_conflict: MergeConflictPolicy::Error,
            partial: false,
        }
    }

    /// Creates the default strategy for partial writes.
    #[must_use]
    pub const fn partial() -> Self {
        Self::new().with_partial(true)
    }

    /// Sets the policy for existing features.
    #[must_use]
    pub const fn on_exists(mut self, policy: ExistsPolicy) -> Self {
        self.on_exists = policy;
        self
    }

    /// Sets the policy for missing features.
    #[must_use]
    pub const fn on_not_exists(mut self, policy: NotExistsPolicy) -> Self {
        self.on_not_exists = Some(policy);
        self
    }

    /// Enables version conflict detection with the given policy.
    #[must_use]
    pub const fn on_version_conflict(mut self, policy: VersionConflictPolicy) -> Self {
        self.on_version_conflict = Some(policy);
        self
    }

    /// Enables version conflict detection with the default policy.
    #[must_use]
    pub const fn detect_version_conflicts(mut self) -> Self {
        self.detect_conflicts = true;
        self
    }

    /// Sets the policy for merge conflicts.
    #[must_use]
    pub const fn on_merge_conflict(mut self, policy: MergeConflictPolicy) -> Self {
        self.on_merge_conflict = policy;
        self
    }

    /// Sets whether incoming features are patches.
    #[must_use]
    pub const fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Returns the effective policy for missing features.
    #[must_use]
    pub fn not_exists_policy(&self) -> NotExistsPolicy {
        self.on_not_exists.unwrap_or(if self.partial {
            NotExistsPolicy::Error
        } else {
            NotExistsPolicy::Create
        })
    }

    /// Returns the effective version conflict policy, `None` if detection
    /// is off.
    #[must_use]
    pub fn version_conflict_policy(&self, is_delete: bool) -> Option<VersionConflictPolicy> {
        match self.on_version_conflict {
            Some(policy) => Some(policy),
            None if self.detect_conflicts => Some(VersionConflictPolicy::default_for(is_delete)),
            None => None,
        }
    }

    /// Checks the strategy against the space it is used on.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::IllegalArgument`] if a partial write names a
    /// policy for missing features, or if a merge is requested on a space
    /// without history.
    pub fn validate(&self, history: bool, is_delete: bool) -> WriteResult<()> {
        if self.partial && self.on_not_exists.is_some() {
            return Err(WriteError::illegal_argument(
                "onNotExists must not be defined for partial writes",
            ));
        }
        if !history && self.version_conflict_policy(is_delete) == Some(VersionConflictPolicy::Merge)
        {
            return Err(WriteError::illegal_argument(
                "MERGE can not be executed for spaces without history",
            ));
        }
        Ok(())
    }
}
