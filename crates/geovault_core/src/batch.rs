//! Batched execution of terminal row writes.
//!
//! Writes are grouped by statement shape. In [`ExecutionMode::Deferred`]
//! every group is executed in one round trip on [`BatchedExecutor::flush`];
//! in [`ExecutionMode::Immediate`] each write runs when it is queued.

use crate::config::ExecutionMode;
use geovault_storage::{RowParams, RowResult, RowStore, StorageError, StorageResult, WriteStatement};
use std::collections::HashMap;
use tracing::debug;

/// Consumes the row result of one queued write.
pub type ResultHandler<'a, T> = Box<dyn FnOnce(StorageResult<RowResult>) -> T + 'a>;

struct Entry<'a, T> {
    slot: usize,
    params: RowParams,
    handler: ResultHandler<'a, T>,
}

/// Collects row writes and hands each result back to its handler.
///
/// The handler of the *i*-th tuple of a statement group receives the
/// *i*-th result of that group. Results are returned ordered by the slot
/// the caller queued them under, independent of how writes were grouped.
pub struct BatchedExecutor<'a, T> {
    store: &'a dyn RowStore,
    mode: ExecutionMode,
    order: Vec<WriteStatement>,
    groups: HashMap<WriteStatement, Vec<Entry<'a, T>>>,
}

impl<'a, T> BatchedExecutor<'a, T> {
    /// Creates an executor writing to `store`.
    pub fn new(store: &'a dyn RowStore, mode: ExecutionMode) -> Self {
        Self {
            store,
            mode,
            order: Vec::new(),
            groups: HashMap::new(),
        }
    }

    /// Returns the execution mode.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns the number of queued writes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Queues a write.
    ///
    /// In immediate mode the write runs right away and the handler's value
    /// is returned. In deferred mode `None` is returned and the value is
    /// produced by the next [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// Returns an error if the statement as a whole fails in immediate mode.
    pub fn queue(
        &mut self,
        slot: usize,
        statement: WriteStatement,
        params: RowParams,
        handler: ResultHandler<'a, T>,
    ) -> StorageResult<Option<T>> {
        match self.mode {
            ExecutionMode::Immediate => self.execute_now(&statement, params, handler).map(Some),
            ExecutionMode::Deferred => {
                if !self.groups.contains_key(&statement) {
                    self.order.push(statement.clone());
                }
                self.groups.entry(statement).or_default().push(Entry {
                    slot,
                    params,
                    handler,
                });
                Ok(None)
            }
        }
    }

    /// Executes a single write, bypassing the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement as a whole fails.
    pub fn execute_now(
        &self,
        statement: &WriteStatement,
        params: RowParams,
        handler: ResultHandler<'a, T>,
    ) -> StorageResult<T> {
        let mut results = self.store.execute(statement, std::slice::from_ref(&params))?;
        let result = results.pop().ok_or_else(|| {
            StorageError::Corrupted(format!("{} returned no result", statement.name()))
        })?;
        Ok(handler(result))
    }

    /// Executes every queued group once and runs all handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement as a whole fails or returns a result
    /// count different from its tuple count. Handlers of the failing group
    /// and of later groups are dropped.
    pub fn flush(&mut self) -> StorageResult<Vec<(usize, T)>> {
        let mut completed = Vec::with_capacity(self.pending());
        for statement in std::mem::take(&mut self.order) {
            let Some(entries) = self.groups.remove(&statement) else {
                continue;
            };
            let (meta, params): (Vec<_>, Vec<_>) = entries
                .into_iter()
                .map(|entry| ((entry.slot, entry.handler), entry.params))
                .unzip();

            let results = match self.store.execute(&statement, &params) {
                Ok(results) => results,
                Err(err) => {
                    self.groups.clear();
                    return Err(err);
                }
            };
            debug!(
                statement = statement.name(),
                table = statement.table(),
                tuples = params.len(),
                "flushed statement group"
            );
            if results.len() != params.len() {
                self.groups.clear();
                return Err(StorageError::Corrupted(format!(
                    "{} returned {} results for {} tuples",
                    statement.name(),
                    results.len(),
                    params.len()
                )));
            }
            for ((slot, handler), result) in meta.into_iter().zip(results) {
                completed.push((slot, handler(result)));
            }
        }
        completed.sort_by_key(|(slot, _)| *slot);
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geovault_storage::{InMemoryRowStore, Operation, Row, UpsertConflict};
    use serde_json::json;

    fn upsert(table: &str) -> WriteStatement {
        WriteStatement::UpsertRow {
            table: table.into(),
            on_conflict: UpsertConflict::Replace,
            preserve: None,
        }
    }

    fn params(id: &str) -> RowParams {
        RowParams::write(Row::head(id, 1, Operation::Insert, "a", json!({}), None))
    }

    fn tag(id: &'static str) -> ResultHandler<'static, (&'static str, bool)> {
        Box::new(move |result| (id, result.is_ok()))
    }

    #[test]
    fn deferred_writes_share_round_trips() {
        let store = InMemoryRowStore::with_tables(["a", "b"]);
        let mut executor = BatchedExecutor::new(&store, ExecutionMode::Deferred);

        assert!(executor.queue(0, upsert("a"), params("1"), tag("1")).unwrap().is_none());
        assert!(executor.queue(1, upsert("b"), params("2"), tag("2")).unwrap().is_none());
        assert!(executor.queue(2, upsert("a"), params("3"), tag("3")).unwrap().is_none());
        assert_eq!(executor.pending(), 3);

        let before = store.stats();
        let done = executor.flush().unwrap();
        assert_eq!(store.stats().since(&before).round_trips, 2);

        let order: Vec<_> = done.iter().map(|(slot, (id, ok))| (*slot, *id, *ok)).collect();
        assert_eq!(order, vec![(0, "1", true), (1, "2", true), (2, "3", true)]);
        assert!(executor.is_empty());
    }

    #[test]
    fn immediate_writes_return_at_once() {
        let store = InMemoryRowStore::with_tables(["a"]);
        let mut executor = BatchedExecutor::new(&store, ExecutionMode::Immediate);
        let value = executor.queue(0, upsert("a"), params("1"), tag("1")).unwrap();
        assert_eq!(value, Some(("1", true)));
        assert!(executor.flush().unwrap().is_empty());
    }

    #[test]
    fn tuple_failures_reach_their_handler() {
        let store = InMemoryRowStore::with_tables(["a"]);
        let mut executor = BatchedExecutor::new(&store, ExecutionMode::Deferred);
        let strict = WriteStatement::UpsertRow {
            table: "a".into(),
            on_conflict: UpsertConflict::Error,
            preserve: None,
        };
        executor.queue(0, strict.clone(), params("1"), tag("first")).unwrap();
        executor.queue(1, strict, params("1"), tag("second")).unwrap();

        let done = executor.flush().unwrap();
        assert_eq!(done[0].1, ("first", true));
        assert_eq!(done[1].1, ("second", false));
    }

    #[test]
    fn unknown_table_fails_the_flush() {
        let store = InMemoryRowStore::new();
        let mut executor = BatchedExecutor::new(&store, ExecutionMode::Deferred);
        executor.queue(0, upsert("missing"), params("1"), tag("1")).unwrap();
        assert!(executor.flush().is_err());
    }
}
