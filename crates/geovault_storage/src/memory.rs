//! In-memory row store.

use crate::codec::{decode, encode, set_pointer};
use crate::error::{StorageError, StorageResult};
use crate::row::{Operation, Row, MAX_VERSION};
use crate::statement::{
    DeletePredicate, RetireGuard, RowParams, RowResult, UpsertConflict, WriteStatement,
};
use crate::stats::{StoreStats, StoreStatsSnapshot};
use crate::store::RowStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A row as it sits in the store, payload and geometry CBOR encoded.
#[derive(Debug, Clone)]
struct StoredRow {
    next_version: i64,
    operation: Operation,
    author: String,
    payload: Vec<u8>,
    geometry: Option<Vec<u8>>,
}

impl StoredRow {
    fn encode(row: &Row) -> StorageResult<Self> {
        Ok(Self {
            next_version: row.next_version,
            operation: row.operation,
            author: row.author.clone(),
            payload: encode(&row.payload)?,
            geometry: row.geometry.as_ref().map(encode).transpose()?,
        })
    }

    fn decode(&self, id: &str, version: i64) -> StorageResult<Row> {
        Ok(Row {
            id: id.to_string(),
            version,
            next_version: self.next_version,
            operation: self.operation,
            author: self.author.clone(),
            payload: decode(&self.payload)?,
            geometry: self.geometry.as_deref().map(decode).transpose()?,
        })
    }
}

/// One versioned table.
#[derive(Debug, Default)]
struct Table {
    /// All rows keyed by `(id, version)`.
    rows: BTreeMap<(String, i64), StoredRow>,
    /// Version of the HEAD row per id.
    heads: HashMap<String, i64>,
    sequence: i64,
    partitions: BTreeSet<i64>,
}

impl Table {
    fn head(&self, id: &str) -> Option<(i64, &StoredRow)> {
        let version = *self.heads.get(id)?;
        self.rows
            .get(&(id.to_string(), version))
            .map(|row| (version, row))
    }

    fn rows_of<'a>(&'a self, id: &str) -> impl Iterator<Item = (i64, &'a StoredRow)> + 'a {
        self.rows
            .range((id.to_string(), i64::MIN)..=(id.to_string(), i64::MAX))
            .map(|((_, version), row)| (*version, row))
    }

    /// Reads the value at `pointer` from the latest row of `id`.
    fn preserved_value(&self, id: &str, pointer: Option<&str>) -> StorageResult<Option<Value>> {
        let Some(pointer) = pointer else {
            return Ok(None);
        };
        let Some((_, latest)) = self.rows_of(id).last() else {
            return Ok(None);
        };
        Ok(decode(&latest.payload)?.pointer(pointer).cloned())
    }

    fn put(&mut self, table: &str, row: &Row) -> StorageResult<()> {
        let key = (row.id.clone(), row.version);
        if (row.is_head() && self.heads.contains_key(&row.id)) || self.rows.contains_key(&key) {
            return Err(StorageError::UniqueViolation {
                table: table.to_string(),
                id: row.id.clone(),
            });
        }
        self.rows.insert(key, StoredRow::encode(row)?);
        if row.is_head() {
            self.heads.insert(row.id.clone(), row.version);
        }
        Ok(())
    }

    fn remove_head(&mut self, id: &str) -> Option<StoredRow> {
        let version = self.heads.remove(id)?;
        self.rows.remove(&(id.to_string(), version))
    }

    /// Replaces the HEAD row of `row.id`, keeping the value at `preserve`.
    fn replace_head(
        &mut self,
        table: &str,
        mut row: Row,
        preserve: Option<&str>,
    ) -> StorageResult<Option<Value>> {
        let preserved = self.preserved_value(&row.id, preserve)?;
        if let (Some(pointer), Some(value)) = (preserve, &preserved) {
            set_pointer(&mut row.payload, pointer, value.clone());
        }
        self.remove_head(&row.id);
        self.put(table, &row)?;
        Ok(preserved)
    }
}

/// An in-memory row store.
///
/// Tables are created explicitly; every other table name is rejected with
/// [`StorageError::UnknownTable`]. All tables share one lock, so every call
/// is atomic with respect to every other call.
///
/// # Example
///
/// ```rust
/// use geovault_storage::{InMemoryRowStore, Operation, Row, RowParams, RowResult, RowStore,
///     UpsertConflict, WriteStatement};
/// use serde_json::json;
///
/// let store = InMemoryRowStore::with_tables(["roads"]);
/// let stmt = WriteStatement::UpsertRow {
///     table: "roads".into(),
///     on_conflict: UpsertConflict::Error,
///     preserve: None,
/// };
/// let row = Row::head("F1", 1, Operation::Insert, "alice", json!({}), None);
/// let results = store.execute(&stmt, &[RowParams::write(row)]).unwrap();
/// assert!(matches!(results[0], Ok(RowResult::Upserted { .. })));
/// assert!(store.load_head("roads", "F1").unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    tables: RwLock<HashMap<String, Table>>,
    stats: StoreStats,
}

impl InMemoryRowStore {
    /// Creates a store without tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given tables.
    pub fn with_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for table in tables {
            store.create_table(table);
        }
        store
    }

    /// Creates a table. Returns false if it already existed.
    pub fn create_table(&self, name: impl Into<String>) -> bool {
        let mut tables = self.tables.write();
        let name = name.into();
        if tables.contains_key(&name) {
            return false;
        }
        tracing::debug!(table = %name, "creating table");
        tables.insert(name, Table::default());
        true
    }

    /// Returns the names of all tables, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the total number of rows of a table, history included.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn row_count(&self, table: &str) -> StorageResult<usize> {
        self.with_table(table, |t| Ok(t.rows.len()))
    }

    /// Returns the history partitions of a table, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn partitions(&self, table: &str) -> StorageResult<Vec<i64>> {
        self.with_table(table, |t| Ok(t.partitions.iter().copied().collect()))
    }

    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&Table) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        f(t)
    }

    fn with_table_mut<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Table) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        f(t)
    }

    fn execute_one(
        &self,
        table_name: &str,
        table: &mut Table,
        statement: &WriteStatement,
        params: &RowParams,
    ) -> StorageResult<RowResult> {
        let row = &params.row;
        match statement {
            WriteStatement::InsertHistoryRow { preserve, .. } => {
                let mut row = row.clone();
                let preserved = table.preserved_value(&row.id, preserve.as_deref())?;
                if let (Some(pointer), Some(value)) = (preserve.as_deref(), &preserved) {
                    set_pointer(&mut row.payload, pointer, value.clone());
                }
                table.put(table_name, &row)?;
                self.stats.record_write();
                Ok(RowResult::Inserted { preserved })
            }
            WriteStatement::UpsertRow {
                on_conflict,
                preserve,
                ..
            } => {
                if table.head(&row.id).is_none() {
                    table.put(table_name, row)?;
                    self.stats.record_write();
                    return Ok(RowResult::Upserted {
                        operation: row.operation,
                        preserved: None,
                    });
                }
                match on_conflict {
                    UpsertConflict::Error => Err(StorageError::UniqueViolation {
                        table: table_name.to_string(),
                        id: row.id.clone(),
                    }),
                    UpsertConflict::Retain => Ok(RowResult::Skipped),
                    UpsertConflict::Replace => {
                        let mut replacement = row.clone();
                        replacement.operation = row.operation.to_update();
                        let operation = replacement.operation;
                        let preserved =
                            table.replace_head(table_name, replacement, preserve.as_deref())?;
                        self.stats.record_write();
                        Ok(RowResult::Upserted {
                            operation,
                            preserved,
                        })
                    }
                }
            }
            WriteStatement::UpdateRow { preserve, .. } => {
                let expected = params.expected_version.ok_or_else(|| {
                    StorageError::invalid_params(statement.name(), "missing expected version")
                })?;
                match table.head(&row.id) {
                    Some((version, _)) if version == expected => {
                        let preserved =
                            table.replace_head(table_name, row.clone(), preserve.as_deref())?;
                        self.stats.record_write();
                        Ok(RowResult::Updated { preserved })
                    }
                    _ => Ok(RowResult::NotMatched),
                }
            }
            WriteStatement::DeleteRow { predicate, .. } => {
                let removed = match predicate {
                    DeletePredicate::AllVersions => {
                        let keys: Vec<_> = table
                            .rows_of(&row.id)
                            .map(|(version, _)| (row.id.clone(), version))
                            .collect();
                        for key in &keys {
                            table.rows.remove(key);
                        }
                        table.heads.remove(&row.id);
                        keys.len()
                    }
                    DeletePredicate::HeadOnly => usize::from(table.remove_head(&row.id).is_some()),
                    DeletePredicate::VersionEquals => {
                        let expected = params.expected_version.ok_or_else(|| {
                            StorageError::invalid_params(
                                statement.name(),
                                "missing expected version",
                            )
                        })?;
                        match table.head(&row.id) {
                            Some((version, _)) if version == expected => {
                                usize::from(table.remove_head(&row.id).is_some())
                            }
                            _ => 0,
                        }
                    }
                };
                self.stats.record_delete(removed);
                Ok(RowResult::Deleted(removed))
            }
        }
    }
}

impl RowStore for InMemoryRowStore {
    fn next_sequence(&self, table: &str) -> StorageResult<i64> {
        self.stats.record_round_trip();
        self.with_table_mut(table, |t| {
            t.sequence += 1;
            Ok(t.sequence)
        })
    }

    fn current_sequence(&self, table: &str) -> StorageResult<i64> {
        self.stats.record_round_trip();
        self.with_table(table, |t| Ok(t.sequence))
    }

    fn retire_head(
        &self,
        table: &str,
        id: &str,
        guard: RetireGuard,
        new_version: i64,
    ) -> StorageResult<Option<Row>> {
        self.stats.record_round_trip();
        self.with_table_mut(table, |t| {
            let Some((version, stored)) = t.head(id) else {
                return Ok(None);
            };
            if !guard.accepts(version) {
                return Ok(None);
            }
            let retired = stored.decode(id, version)?;
            if let Some(stored) = t.rows.get_mut(&(id.to_string(), version)) {
                stored.next_version = new_version;
            }
            t.heads.remove(id);
            self.stats.record_write();
            Ok(Some(retired))
        })
    }

    fn load_head(&self, table: &str, id: &str) -> StorageResult<Option<Row>> {
        self.stats.record_round_trip();
        let row = self.with_table(table, |t| {
            t.head(id)
                .map(|(version, stored)| stored.decode(id, version))
                .transpose()
        })?;
        self.stats.record_read(usize::from(row.is_some()));
        Ok(row)
    }

    fn load_at_version(&self, table: &str, id: &str, version: i64) -> StorageResult<Option<Row>> {
        self.stats.record_round_trip();
        let row = self.with_table(table, |t| {
            t.rows_of(id)
                .find(|(v, stored)| *v <= version && version < stored.next_version)
                .map(|(v, stored)| stored.decode(id, v))
                .transpose()
        })?;
        self.stats.record_read(usize::from(row.is_some()));
        Ok(row)
    }

    fn history(&self, table: &str, id: &str) -> StorageResult<Vec<Row>> {
        self.stats.record_round_trip();
        let rows = self.with_table(table, |t| {
            t.rows_of(id)
                .map(|(version, stored)| stored.decode(id, version))
                .collect::<StorageResult<Vec<_>>>()
        })?;
        self.stats.record_read(rows.len());
        Ok(rows)
    }

    fn execute(
        &self,
        statement: &WriteStatement,
        params: &[RowParams],
    ) -> StorageResult<Vec<StorageResult<RowResult>>> {
        self.stats.record_round_trip();
        self.stats.record_statement(params.len());
        let table_name = statement.table();
        self.with_table_mut(table_name, |t| {
            Ok(params
                .iter()
                .map(|p| self.execute_one(table_name, t, statement, p))
                .collect())
        })
    }

    fn ensure_partition(&self, table: &str, partition: i64) -> StorageResult<bool> {
        self.stats.record_round_trip();
        self.with_table_mut(table, |t| Ok(t.partitions.insert(partition)))
    }

    fn prune_history(&self, table: &str, max_next_version: i64) -> StorageResult<usize> {
        self.stats.record_round_trip();
        let removed = self.with_table_mut(table, |t| {
            let before = t.rows.len();
            t.rows.retain(|_, row| {
                row.next_version == MAX_VERSION || row.next_version > max_next_version
            });
            Ok(before - t.rows.len())
        })?;
        self.stats.record_delete(removed);
        Ok(removed)
    }

    fn stats(&self) -> StoreStatsSnapshot {
        self.stats.snapshot()
    }
}
