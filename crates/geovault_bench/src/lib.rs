//! Benchmark utilities.

#![warn(missing_docs)]

use geovault_core::{random_id, Feature};
use serde_json::{json, Map, Value};

/// Generate a property map with `count` entries.
pub fn properties(count: usize, seed: i64) -> Map<String, Value> {
    (0..count)
        .map(|i| (format!("p{i}"), json!({"value": seed + i as i64, "label": format!("v{seed}")})))
        .collect()
}

/// Generate a road feature with `property_count` properties.
pub fn road(id: impl Into<String>, property_count: usize) -> Feature {
    Feature {
        properties: properties(property_count, 0),
        ..Feature::new(id)
    }
    .with_geometry(json!({
        "type": "LineString",
        "coordinates": [[8.68, 50.11], [8.69, 50.12], [8.70, 50.13]]
    }))
}

/// Generate features with fresh random ids.
pub fn generate_features(count: usize, property_count: usize) -> Vec<Feature> {
    (0..count).map(|_| road(random_id(), property_count)).collect()
}
