//! Operation codes of written rows.

use geovault_storage::Operation;

/// Operation of a row appended after a HEAD retirement.
///
/// `prev_live` tells whether the retired HEAD was a live feature, `in_base`
/// whether a layer below the target still holds one. Returns the operation
/// and whether the write changes what readers see.
pub(crate) fn history_operation(tombstone: bool, prev_live: bool, in_base: bool) -> (Operation, bool) {
    match (tombstone, prev_live, in_base) {
        (true, true, true) => (Operation::Join, true),
        (true, true, false) => (Operation::Delete, true),
        (true, false, true) => (Operation::HistoryDelete, true),
        (true, false, false) => (Operation::Delete, false),
        (false, true, _) => (Operation::Update, true),
        (false, false, true) => (Operation::Join, true),
        (false, false, false) => (Operation::Insert, true),
    }
}

/// Operation of a row written without history.
///
/// Upserts that replace a HEAD row map this onto its update counterpart.
pub(crate) fn upsert_operation(tombstone: bool, in_base: bool) -> Operation {
    if tombstone {
        Operation::HistoryDelete
    } else if in_base {
        Operation::Join
    } else {
        Operation::Insert
    }
}

/// Operation of a conditional in-place update.
pub(crate) fn update_operation(tombstone: bool, in_base: bool) -> Operation {
    if tombstone || in_base {
        Operation::Join
    } else {
        Operation::Update
    }
}
