//! Row store trait definition.

use crate::error::StorageResult;
use crate::row::Row;
use crate::stats::StoreStatsSnapshot;
use crate::statement::{RetireGuard, RowParams, RowResult, WriteStatement};

/// A keyed, versioned table store.
///
/// The row store is the only place where concurrency is resolved: the write
/// engine never locks in-process. Two writers racing for the same HEAD row
/// are serialized by [`RowStore::retire_head`] and [`RowStore::execute`].
///
/// # Invariants
///
/// - At most one row per `(table, id)` has `next_version == MAX_VERSION`
/// - `(id, next_version)` is unique per table
/// - `retire_head` is an atomic compare-and-swap on `next_version`
/// - Every read returns an independent copy of the stored row
///
/// # Implementors
///
/// - [`super::InMemoryRowStore`] - For testing and embedded use
pub trait RowStore: Send + Sync {
    /// Returns the next value of the table's version sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    fn next_sequence(&self, table: &str) -> StorageResult<i64>;

    /// Returns the last value handed out by the table's version sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    fn current_sequence(&self, table: &str) -> StorageResult<i64>;

    /// Atomically sets `next_version = new_version` on the HEAD row of `id`
    /// if the guard accepts the HEAD's version.
    ///
    /// Returns the retired row (as it was before retirement), or `None` if
    /// no HEAD row matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the row is unreadable.
    fn retire_head(
        &self,
        table: &str,
        id: &str,
        guard: RetireGuard,
        new_version: i64,
    ) -> StorageResult<Option<Row>>;

    /// Loads the HEAD row of `id`, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the row is unreadable.
    fn load_head(&self, table: &str, id: &str) -> StorageResult<Option<Row>>;

    /// Loads the row of `id` that was valid at `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the row is unreadable.
    fn load_at_version(&self, table: &str, id: &str, version: i64) -> StorageResult<Option<Row>>;

    /// Returns every row of `id`, ordered by version.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or a row is unreadable.
    fn history(&self, table: &str, id: &str) -> StorageResult<Vec<Row>>;

    /// Executes one statement for a whole batch of parameter tuples.
    ///
    /// This is a single round trip. The returned vector has exactly one
    /// entry per tuple, in tuple order. A failing tuple does not prevent the
    /// remaining tuples from executing.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement as a whole cannot run (e.g. the
    /// table does not exist).
    fn execute(
        &self,
        statement: &WriteStatement,
        params: &[RowParams],
    ) -> StorageResult<Vec<StorageResult<RowResult>>>;

    /// Makes sure the history partition with the given number exists.
    ///
    /// Returns true if the partition was created by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    fn ensure_partition(&self, table: &str, partition: i64) -> StorageResult<bool>;

    /// Deletes every non-HEAD row with `next_version <= max_next_version`.
    ///
    /// Returns the number of removed rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    fn prune_history(&self, table: &str, max_next_version: i64) -> StorageResult<usize>;

    /// Returns a snapshot of the store's counters.
    fn stats(&self) -> StoreStatsSnapshot;
}
