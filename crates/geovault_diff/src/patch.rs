//! Applying a diff onto a tree.

use serde_json::{Map, Value};

/// Applies `diff` onto a copy of `target` and returns the result.
///
/// `null` removes a key, an object recurses (creating the object if the
/// target has none), every other value overwrites. `target` itself is never
/// modified, so the same loaded tree can be patched more than once.
///
/// # Example
///
/// ```rust
/// use geovault_diff::patch;
/// use serde_json::json;
///
/// let head = json!({"properties": {"name": "A", "lanes": 2}});
/// let change = json!({"properties": {"lanes": null, "speed": 30}});
/// assert_eq!(
///     patch(&head, &change),
///     json!({"properties": {"name": "A", "speed": 30}})
/// );
/// ```
#[must_use]
pub fn patch(target: &Value, diff: &Value) -> Value {
    let mut out = target.clone();
    if let Value::Object(changes) = diff {
        apply(&mut out, changes);
    }
    out
}

fn apply(target: &mut Value, changes: &Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };
    for (key, change) in changes {
        match change {
            Value::Null => {
                map.remove(key);
            }
            Value::Object(nested) => {
                apply(map.entry(key.clone()).or_insert(Value::Null), nested);
            }
            other => {
                map.insert(key.clone(), other.clone());
            }
        }
    }
}
