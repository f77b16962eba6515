//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random features, property trees
//! and write sequences.

use geovault_core::Feature;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Strategy for generating valid feature ids.
pub fn feature_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9_-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating property keys.
///
/// Keys never start with `@`, so they cannot collide with the metadata
/// namespace.
pub fn property_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,9}").expect("Invalid regex")
}

/// Strategy for generating non-null leaf values.
pub fn leaf_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(|v| json!(v)),
    ]
}

/// Strategy for generating property trees up to three levels deep.
///
/// Nested objects are never empty and no value is `null`, since both have
/// special meaning in a diff.
pub fn property_tree_strategy() -> impl Strategy<Value = Map<String, Value>> {
    let nested = leaf_value_strategy().prop_recursive(2, 16, 4, |inner| {
        prop::collection::btree_map(property_key_strategy(), inner, 1..4)
            .prop_map(|map| Value::Object(map.into_iter().collect()))
    });
    prop::collection::btree_map(property_key_strategy(), nested, 0..6)
        .prop_map(|map| map.into_iter().collect())
}

/// Strategy for generating point geometries.
pub fn point_strategy() -> impl Strategy<Value = Value> {
    (-180.0f64..180.0, -90.0f64..90.0)
        .prop_map(|(lon, lat)| json!({"type": "Point", "coordinates": [lon, lat]}))
}

/// Strategy for generating features without metadata.
pub fn feature_strategy() -> impl Strategy<Value = Feature> {
    (
        feature_id_strategy(),
        property_tree_strategy(),
        prop::option::of(point_strategy()),
    )
        .prop_map(|(id, properties, geometry)| Feature {
            properties,
            geometry,
            ..Feature::new(id)
        })
}

/// Two concurrent edits of the same base that touch disjoint keys.
#[derive(Debug, Clone)]
pub struct DisjointEdits {
    /// Properties both edits started from.
    pub base: Map<String, Value>,
    /// Properties after the first edit.
    pub ours: Map<String, Value>,
    /// Properties after the second edit.
    pub theirs: Map<String, Value>,
}

impl DisjointEdits {
    /// Returns the properties after both edits.
    pub fn merged(&self) -> Map<String, Value> {
        let mut merged = self.base.clone();
        for edit in [&self.ours, &self.theirs] {
            for (key, value) in edit {
                if self.base.get(key) != Some(value) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }
}

/// Strategy for generating two edits of eight integer properties.
///
/// Every key is changed by at most one side.
pub fn disjoint_edits_strategy() -> impl Strategy<Value = DisjointEdits> {
    prop::collection::vec((any::<i32>(), 0u8..3, 1i64..100), 8).prop_map(|keys| {
        let mut edits = DisjointEdits {
            base: Map::new(),
            ours: Map::new(),
            theirs: Map::new(),
        };
        for (i, (value, owner, delta)) in keys.into_iter().enumerate() {
            let key = format!("k{i}");
            let value = i64::from(value);
            let changed = Value::from(value + delta);
            edits.base.insert(key.clone(), Value::from(value));
            let (ours, theirs) = match owner {
                1 => (changed, Value::from(value)),
                2 => (Value::from(value), changed),
                _ => (Value::from(value), Value::from(value)),
            };
            edits.ours.insert(key.clone(), ours);
            edits.theirs.insert(key, theirs);
        }
        edits
    })
}

/// A write against a small set of feature ids.
#[derive(Debug, Clone)]
pub enum FeatureOperation {
    /// Write the full feature
    Write {
        /// Feature id
        id: String,
        /// New properties
        properties: Map<String, Value>,
    },
    /// Patch some properties of an existing feature
    Patch {
        /// Feature id
        id: String,
        /// Changed properties
        properties: Map<String, Value>,
    },
    /// Delete the feature
    Delete {
        /// Feature id
        id: String,
    },
}

impl FeatureOperation {
    /// Returns the id the operation targets.
    pub fn id(&self) -> &str {
        match self {
            Self::Write { id, .. } | Self::Patch { id, .. } | Self::Delete { id } => id,
        }
    }
}

/// Strategy for generating one to three flat properties.
fn flat_properties_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(property_key_strategy(), leaf_value_strategy(), 1..4)
        .prop_map(|map| map.into_iter().collect())
}

/// Strategy for generating operations on ids `F0` to `F3`.
pub fn feature_operation_strategy() -> impl Strategy<Value = FeatureOperation> {
    let id = (0..4u8).prop_map(|i| format!("F{i}"));
    prop_oneof![
        3 => (id.clone(), flat_properties_strategy())
            .prop_map(|(id, properties)| FeatureOperation::Write { id, properties }),
        2 => (id.clone(), flat_properties_strategy())
            .prop_map(|(id, properties)| FeatureOperation::Patch { id, properties }),
        1 => id.prop_map(|id| FeatureOperation::Delete { id }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<FeatureOperation>> {
    prop::collection::vec(feature_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
