//! Feature modifications: one part of a multi-strategy write request.

use crate::feature::Feature;
use crate::strategy::UpdateStrategy;

/// Payload of a modification.
#[derive(Debug, Clone, PartialEq)]
pub enum ModificationPayload {
    /// Full or partial feature states.
    Features(Vec<Feature>),
    /// Ids of features to delete.
    DeleteIds(Vec<String>),
}

/// A batch of features written with its own strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureModification {
    /// What to write.
    pub payload: ModificationPayload,
    /// How to write it.
    pub strategy: UpdateStrategy,
}

impl FeatureModification {
    /// Creates a modification writing the given features.
    #[must_use]
    pub fn write(features: Vec<Feature>, strategy: UpdateStrategy) -> Self {
        Self {
            payload: ModificationPayload::Features(features),
            strategy,
        }
    }

    /// Creates a modification deleting the given ids.
    pub fn delete<I, S>(ids: I, strategy: UpdateStrategy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            payload: ModificationPayload::DeleteIds(ids.into_iter().map(Into::into).collect()),
            strategy,
        }
    }

    /// Returns the number of features touched.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.payload {
            ModificationPayload::Features(features) => features.len(),
            ModificationPayload::DeleteIds(ids) => ids.len(),
        }
    }

    /// Returns true if the modification touches nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turns the payload into the features to write, deletes becoming
    /// tombstones.
    pub(crate) fn into_features(self) -> (Vec<Feature>, UpdateStrategy) {
        let features = match self.payload {
            ModificationPayload::Features(features) => features,
            ModificationPayload::DeleteIds(ids) => ids.into_iter().map(Feature::tombstone).collect(),
        };
        (features, self.strategy)
    }
}
