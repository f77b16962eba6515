//! Model-based test harness.
//!
//! Applies writes to a test space and to a plain map of expected states,
//! and checks that both agree.

use crate::fixtures::{check_version_ranges, TestSpace};
use crate::generators::FeatureOperation;
use geovault_core::{Action, ErrorCode, Feature, UpdateStrategy};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// A test space together with the properties every feature should have.
pub struct ModelHarness {
    /// The space under test.
    pub space: TestSpace,
    expected: HashMap<String, Map<String, Value>>,
    touched: BTreeSet<String>,
}

impl ModelHarness {
    /// Creates a harness over a single layer space with history.
    pub fn new() -> Self {
        Self::with_space(TestSpace::single())
    }

    /// Creates a harness over the given space.
    pub fn with_space(space: TestSpace) -> Self {
        Self {
            space,
            expected: HashMap::new(),
            touched: BTreeSet::new(),
        }
    }

    /// Writes the full feature and tracks its properties.
    pub fn write(&mut self, id: &str, properties: Map<String, Value>) {
        let feature = Feature {
            properties: properties.clone(),
            ..Feature::new(id)
        };
        let outcome = self
            .space
            .write_feature(feature, None, &UpdateStrategy::new(), &[])
            .expect("Failed to write feature")
            .expect("Write was skipped");
        let action = if self.expected.contains_key(id) {
            Action::Updated
        } else {
            Action::Inserted
        };
        assert_eq!(outcome.action, action, "Unexpected action for {id}");
        self.expected.insert(id.to_string(), properties);
        self.touched.insert(id.to_string());
    }

    /// Patches some properties of a feature.
    ///
    /// Patching a feature that does not exist must fail.
    pub fn patch(&mut self, id: &str, properties: Map<String, Value>) {
        let feature = Feature {
            properties: properties.clone(),
            ..Feature::new(id)
        };
        let result = self
            .space
            .write_feature(feature, None, &UpdateStrategy::partial(), &[]);
        match self.expected.get_mut(id) {
            Some(current) => {
                let outcome = result
                    .expect("Failed to patch feature")
                    .expect("Patch was skipped");
                assert_eq!(outcome.action, Action::Updated);
                current.extend(properties);
            }
            None => {
                let err = result.expect_err("Patch of a missing feature succeeded");
                assert_eq!(err.code(), ErrorCode::FeatureNotExists);
            }
        }
        self.touched.insert(id.to_string());
    }

    /// Deletes a feature and stops tracking it.
    pub fn delete(&mut self, id: &str) {
        let outcome = self
            .space
            .write_feature(Feature::tombstone(id), None, &UpdateStrategy::new(), &[])
            .expect("Failed to delete feature");
        if self.expected.remove(id).is_some() {
            let outcome = outcome.expect("Delete of a live feature was skipped");
            assert_eq!(outcome.action, Action::Deleted);
        } else {
            assert!(outcome.is_none(), "Delete of a missing feature reported {outcome:?}");
        }
        self.touched.insert(id.to_string());
    }

    /// Applies a generated operation.
    pub fn apply(&mut self, operation: &FeatureOperation) {
        match operation {
            FeatureOperation::Write { id, properties } => self.write(id, properties.clone()),
            FeatureOperation::Patch { id, properties } => self.patch(id, properties.clone()),
            FeatureOperation::Delete { id } => self.delete(id),
        }
    }

    /// Reads a feature and verifies it matches the tracked properties.
    pub fn read_and_verify(&self, id: &str) -> Option<Feature> {
        let actual = self.space.read_feature(id).expect("Failed to read feature");
        match (self.expected.get(id), &actual) {
            (Some(expected), Some(feature)) => {
                assert_eq!(&feature.properties, expected, "Property mismatch for {id}");
            }
            (None, None) => {}
            (expected, actual) => {
                panic!("Existence mismatch for {id}: expected {expected:?}, found {actual:?}")
            }
        }
        actual
    }

    /// Verifies every feature touched so far, and its version ranges.
    pub fn verify_all(&self) {
        let table = self.space.target_table();
        for id in &self.touched {
            self.read_and_verify(id);
            check_version_ranges(self.space.store().as_ref(), table, id);
        }
    }

    /// Returns the number of live tracked features.
    pub fn tracked_count(&self) -> usize {
        self.expected.len()
    }
}

impl Default for ModelHarness {
    fn default() -> Self {
        Self::new()
    }
}
