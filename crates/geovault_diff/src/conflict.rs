//! Conflict detection between two diffs and the three-way merge.

use crate::diff::diff;
use crate::options::{join, values_equal, DiffOptions};
use crate::patch::patch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One path changed differently by two diffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Dotted path of the attribute.
    pub path: String,
    /// Value from the first (incoming) diff.
    pub ours: Value,
    /// Value from the second (HEAD) diff.
    pub theirs: Value,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} <> {}", self.path, self.ours, self.theirs)
    }
}

/// Finds every path both diffs change to different values.
///
/// Paths present in only one diff never conflict. Objects on both sides are
/// walked recursively; everything else is compared for deep equality, with
/// the coordinate equivalence applied below `geometry.coordinates`.
#[must_use]
pub fn find_conflicts(ours: &Value, theirs: &Value, options: &DiffOptions) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    if let (Value::Object(a), Value::Object(b)) = (ours, theirs) {
        walk(a, b, "", options, &mut conflicts);
    }
    conflicts
}

fn walk(
    ours: &Map<String, Value>,
    theirs: &Map<String, Value>,
    path: &str,
    options: &DiffOptions,
    conflicts: &mut Vec<Conflict>,
) {
    for (key, a) in ours {
        let Some(b) = theirs.get(key) else {
            continue;
        };
        let current = join(path, key);
        if options.is_ignored(&current) {
            continue;
        }
        match (a, b) {
            (Value::Object(a), Value::Object(b)) => walk(a, b, &current, options, conflicts),
            _ if values_equal(&current, a, b) => {}
            _ => conflicts.push(Conflict {
                path: current,
                ours: a.clone(),
                theirs: b.clone(),
            }),
        }
    }
}

/// Three-way merge of an incoming change into the current HEAD.
///
/// `incoming` is the incoming change as a diff against `base`. Returns
/// `patch(head, incoming)` when the change is disjoint from
/// `diff(base, head)`, otherwise every conflicting path.
///
/// # Errors
///
/// Returns the list of conflicts if the two changes overlap.
///
/// # Example
///
/// ```rust
/// use geovault_diff::{diff, merge, DiffOptions};
/// use serde_json::json;
///
/// let opts = DiffOptions::new();
/// let base = json!({"a": 1, "b": 1});
/// let head = json!({"a": 2, "b": 1});
/// let incoming = diff(&base, &json!({"a": 1, "b": 3}), &opts);
/// assert_eq!(merge(&base, &head, &incoming, &opts).unwrap(), json!({"a": 2, "b": 3}));
/// ```
pub fn merge(
    base: &Value,
    head: &Value,
    incoming: &Value,
    options: &DiffOptions,
) -> Result<Value, Vec<Conflict>> {
    let head_diff = diff(base, head, options);
    let conflicts = find_conflicts(incoming, &head_diff, options);
    if conflicts.is_empty() {
        Ok(patch(head, incoming))
    } else {
        Err(conflicts)
    }
}
