//! Structural difference of two JSON trees.

use crate::options::{join, values_equal, DiffOptions};
use serde_json::{Map, Value};

/// Computes the change that turns `base` into `target`.
///
/// The result is always an object:
/// - a key whose value is an object on both sides maps to the nested diff,
///   omitted when the nested diff is empty
/// - a key that is new or changed maps to its value in `target`
/// - a key that is gone from `target` maps to `null`
///
/// Ignored paths never appear. A non-object root is treated as `{}`.
///
/// # Example
///
/// ```rust
/// use geovault_diff::{diff, DiffOptions};
/// use serde_json::json;
///
/// let base = json!({"properties": {"name": "A", "lanes": 2}});
/// let target = json!({"properties": {"name": "B"}});
/// let d = diff(&base, &target, &DiffOptions::new());
/// assert_eq!(d, json!({"properties": {"name": "B", "lanes": null}}));
/// ```
#[must_use]
pub fn diff(base: &Value, target: &Value, options: &DiffOptions) -> Value {
    let empty = Map::new();
    let base = base.as_object().unwrap_or(&empty);
    let target = target.as_object().unwrap_or(&empty);
    Value::Object(diff_maps(base, target, "", options))
}

fn diff_maps(
    base: &Map<String, Value>,
    target: &Map<String, Value>,
    path: &str,
    options: &DiffOptions,
) -> Map<String, Value> {
    let mut out = Map::new();

    for (key, new) in target {
        let current = join(path, key);
        if options.is_ignored(&current) {
            continue;
        }
        match (base.get(key), new) {
            (Some(Value::Object(old)), Value::Object(new)) => {
                let nested = diff_maps(old, new, &current, options);
                if !nested.is_empty() {
                    out.insert(key.clone(), Value::Object(nested));
                }
            }
            (Some(old), new) if values_equal(&current, old, new) => {}
            (_, new) => {
                out.insert(key.clone(), new.clone());
            }
        }
    }

    for key in base.keys() {
        if !target.contains_key(key) && !options.is_ignored(&join(path, key)) {
            out.insert(key.clone(), Value::Null);
        }
    }

    out
}
