//! Write outcomes and their aggregation into feature collections.

use crate::error::WriteError;
use crate::feature::Feature;
use geovault_storage::Operation;

/// What a write did to the visible state of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The feature was created.
    Inserted,
    /// The feature was changed.
    Updated,
    /// The feature was deleted.
    Deleted,
    /// Nothing visible changed.
    None,
}

impl Action {
    /// Derives the action from the operation code of the written row.
    #[must_use]
    pub const fn from_operation(operation: Operation, deleted: bool) -> Self {
        if deleted {
            return Action::Deleted;
        }
        match operation {
            Operation::Insert => Action::Inserted,
            Operation::Update | Operation::Join => Action::Updated,
            Operation::Delete | Operation::HistoryDelete => Action::Deleted,
        }
    }
}

/// Result of one feature write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// What happened.
    pub action: Action,
    /// The feature as written.
    pub feature: Feature,
    /// Version of the written row.
    pub version: i64,
    /// Author of the written row.
    pub author: String,
}

impl WriteOutcome {
    /// Returns the id of the written feature.
    #[must_use]
    pub fn id(&self) -> &str {
        self.feature.id().unwrap_or_default()
    }
}

/// A feature of a request that failed under [`crate::ErrorPolicy::Continue`].
#[derive(Debug)]
pub struct FailedWrite {
    /// Position of the feature in the request.
    pub index: usize,
    /// Id of the feature, if it had one.
    pub id: Option<String>,
    /// Why it failed.
    pub error: WriteError,
}

/// Combined result of a multi-feature request.
///
/// Every bucket preserves submission order.
#[derive(Debug, Default)]
pub struct FeatureCollection {
    /// Written features, pure deletes excluded.
    pub features: Vec<Feature>,
    /// Ids of created features.
    pub inserted: Vec<String>,
    /// Ids of changed features.
    pub updated: Vec<String>,
    /// Ids of deleted features.
    pub deleted: Vec<String>,
    /// Ids of features written with an unresolved merge conflict.
    pub conflicting: Vec<String>,
    /// Features that failed.
    pub failed: Vec<FailedWrite>,
}

impl FeatureCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the outcome of one write.
    pub fn push(&mut self, outcome: WriteOutcome) {
        let id = outcome.id().to_string();
        match outcome.action {
            Action::Inserted => self.inserted.push(id.clone()),
            Action::Updated => self.updated.push(id.clone()),
            Action::Deleted => self.deleted.push(id.clone()),
            Action::None => {}
        }
        if outcome.feature.is_conflicting() {
            self.conflicting.push(id);
        }
        if outcome.action != Action::Deleted {
            self.features.push(outcome.feature);
        }
    }

    /// Records a failed write.
    pub fn push_failure(&mut self, failure: FailedWrite) {
        self.failed.push(failure);
    }

    /// Appends another collection, keeping its order behind this one.
    pub fn append(&mut self, other: FeatureCollection) {
        self.features.extend(other.features);
        self.inserted.extend(other.inserted);
        self.updated.extend(other.updated);
        self.deleted.extend(other.deleted);
        self.conflicting.extend(other.conflicting);
        self.failed.extend(other.failed);
    }

    /// Returns true if nothing was written and nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty() && self.deleted.is_empty() && self.failed.is_empty()
    }
}
