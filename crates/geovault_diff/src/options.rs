//! Path handling and value equivalence shared by diff and conflict detection.

use serde_json::Value;
use std::collections::BTreeSet;

/// Dotted path of the GeoJSON coordinate array.
pub const COORDINATES_PATH: &str = "geometry.coordinates";

/// Metadata fields that are rewritten on every write and never diffed.
pub const VOLATILE_META_FIELDS: [&str; 4] = ["author", "version", "createdAt", "updatedAt"];

/// Controls which paths diff and conflict detection look at.
///
/// Paths are dotted (`properties.name`) and always absolute from the root
/// of the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    ignored: BTreeSet<String>,
}

impl DiffOptions {
    /// Options that ignore nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for GeoJSON features whose metadata lives in
    /// `properties.<namespace>`.
    ///
    /// The volatile metadata fields ([`VOLATILE_META_FIELDS`]) are ignored.
    #[must_use]
    pub fn for_features(namespace: &str) -> Self {
        VOLATILE_META_FIELDS
            .iter()
            .fold(Self::new(), |opts, field| {
                opts.ignore(format!("properties.{namespace}.{field}"))
            })
    }

    /// Adds a path that is excluded from diffs and conflicts.
    #[must_use]
    pub fn ignore(mut self, path: impl Into<String>) -> Self {
        self.ignored.insert(path.into());
        self
    }

    /// Returns true if `path` is excluded.
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored.contains(path)
    }
}

/// Appends `key` to a dotted path.
pub(crate) fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Compares two values found at `path`.
///
/// Below [`COORDINATES_PATH`] a 2D position equals the 3D position with a
/// zero altitude. Everything else is deep equality.
pub(crate) fn values_equal(path: &str, a: &Value, b: &Value) -> bool {
    if path == COORDINATES_PATH {
        coordinates_equal(a, b)
    } else {
        a == b
    }
}

fn coordinates_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) if is_position(xs) && is_position(ys) => {
            position_equal(xs, ys)
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| coordinates_equal(x, y))
        }
        _ => a == b,
    }
}

fn is_position(values: &[Value]) -> bool {
    !values.is_empty() && values.iter().all(Value::is_number)
}

fn position_equal(xs: &[Value], ys: &[Value]) -> bool {
    let (short, long) = if xs.len() <= ys.len() { (xs, ys) } else { (ys, xs) };
    let padded = long.len() == 3 && short.len() == 2;
    if short.len() != long.len() && !padded {
        return false;
    }
    let shared = short.iter().zip(long).all(|(x, y)| x.as_f64() == y.as_f64());
    shared && (!padded || long[2].as_f64() == Some(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feature_options_ignore_volatile_metadata() {
        let opts = DiffOptions::for_features("@ns:geovault");
        assert!(opts.is_ignored("properties.@ns:geovault.version"));
        assert!(opts.is_ignored("properties.@ns:geovault.updatedAt"));
        assert!(!opts.is_ignored("properties.@ns:geovault.deleted"));
        assert!(!opts.is_ignored("properties.version"));
    }

    #[test]
    fn join_paths() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a.b", "c"), "a.b.c");
    }

    #[test]
    fn flat_position_equals_zero_altitude() {
        let path = COORDINATES_PATH;
        assert!(values_equal(path, &json!([1.0, 2.0]), &json!([1.0, 2.0, 0])));
        assert!(values_equal(path, &json!([1.0, 2.0, 0.0]), &json!([1.0, 2.0])));
        assert!(!values_equal(path, &json!([1.0, 2.0]), &json!([1.0, 2.0, 5.0])));
        assert!(!values_equal(path, &json!([1.0, 2.0]), &json!([1.0, 3.0, 0.0])));
    }

    #[test]
    fn nested_positions_are_compared_pointwise() {
        let path = COORDINATES_PATH;
        let flat = json!([[[0, 0], [1, 0], [1, 1], [0, 0]]]);
        let lifted = json!([[[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 0, 0]]]);
        assert!(values_equal(path, &flat, &lifted));
        assert!(!values_equal(path, &flat, &json!([[[0, 0], [1, 0]]])));
    }

    #[test]
    fn equivalence_is_limited_to_coordinates() {
        assert!(!values_equal("properties.pos", &json!([1, 2]), &json!([1, 2, 0])));
    }
}
