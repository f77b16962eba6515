//! Row store statistics.
//!
//! Counters for observing how many round trips a workload costs. The batched
//! execution layer is measured against these.
//!
//! # Usage
//!
//! ```rust
//! use geovault_storage::{InMemoryRowStore, RowStore};
//!
//! let store = InMemoryRowStore::with_tables(["roads"]);
//! store.next_sequence("roads").unwrap();
//! let stats = store.stats();
//! assert_eq!(stats.round_trips, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Row store statistics.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Total number of calls into the store.
    round_trips: AtomicU64,
    /// Total number of batched statement executions.
    statements_executed: AtomicU64,
    /// Total number of parameter tuples executed.
    tuples_executed: AtomicU64,
    /// Total number of rows read.
    rows_read: AtomicU64,
    /// Total number of rows inserted, updated or retired.
    rows_written: AtomicU64,
    /// Total number of rows deleted or pruned.
    rows_deleted: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_round_trip(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_statement(&self, tuples: usize) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
        self.tuples_executed
            .fetch_add(tuples as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, rows: usize) {
        self.rows_read.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self, rows: usize) {
        self.rows_deleted.fetch_add(rows as u64, Ordering::Relaxed);
    }

    /// Returns the total number of calls into the store.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Returns the total number of batched statement executions.
    pub fn statements_executed(&self) -> u64 {
        self.statements_executed.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StoreStatsSnapshot {
        StoreStatsSnapshot {
            round_trips: self.round_trips(),
            statements_executed: self.statements_executed(),
            tuples_executed: self.tuples_executed.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_deleted: self.rows_deleted.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of row store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStatsSnapshot {
    /// Total number of calls into the store.
    pub round_trips: u64,
    /// Total number of batched statement executions.
    pub statements_executed: u64,
    /// Total number of parameter tuples executed.
    pub tuples_executed: u64,
    /// Total number of rows read.
    pub rows_read: u64,
    /// Total number of rows inserted, updated or retired.
    pub rows_written: u64,
    /// Total number of rows deleted or pruned.
    pub rows_deleted: u64,
}

impl StoreStatsSnapshot {
    /// Returns the counter differences `self - earlier`.
    #[must_use]
    pub fn since(&self, earlier: &StoreStatsSnapshot) -> StoreStatsSnapshot {
        StoreStatsSnapshot {
            round_trips: self.round_trips - earlier.round_trips,
            statements_executed: self.statements_executed - earlier.statements_executed,
            tuples_executed: self.tuples_executed - earlier.tuples_executed,
            rows_read: self.rows_read - earlier.rows_read,
            rows_written: self.rows_written - earlier.rows_written,
            rows_deleted: self.rows_deleted - earlier.rows_deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = StoreStats::new();
        assert_eq!(stats.round_trips(), 0);
        assert_eq!(stats.snapshot(), StoreStatsSnapshot::default());
    }

    #[test]
    fn record_statement_counts_tuples() {
        let stats = StoreStats::new();
        stats.record_round_trip();
        stats.record_statement(3);
        stats.record_statement(2);

        let snap = stats.snapshot();
        assert_eq!(snap.round_trips, 1);
        assert_eq!(snap.statements_executed, 2);
        assert_eq!(snap.tuples_executed, 5);
    }

    #[test]
    fn since_subtracts() {
        let stats = StoreStats::new();
        stats.record_round_trip();
        let before = stats.snapshot();
        stats.record_round_trip();
        stats.record_write();

        let delta = stats.snapshot().since(&before);
        assert_eq!(delta.round_trips, 1);
        assert_eq!(delta.rows_written, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(StoreStats::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_round_trip();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.round_trips(), 1000);
    }
}
