//! Stress tests for the write engine.
//!
//! These tests verify behavior under heavy load and concurrent writers.

use crate::fixtures::TestSpace;
use geovault_core::{
    Action, ErrorCode, Feature, UpdateStrategy, VersionConflictPolicy, WriteOutcome, WriteResult,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// What a stress run wrote and read.
#[derive(Debug, Clone, Default)]
pub struct StressTestResult {
    /// Features inserted.
    pub inserted: usize,
    /// Features updated.
    pub updated: usize,
    /// Reads that found their feature.
    pub reads: usize,
    /// Writes rejected with a version conflict.
    pub conflicts: usize,
    /// Operations that failed for any other reason, or found nothing.
    pub failed: usize,
    /// Wall time of the run.
    pub duration: Duration,
}

impl StressTestResult {
    /// Returns the number of operations that went through.
    pub fn successful_ops(&self) -> usize {
        self.inserted + self.updated + self.reads
    }

    /// Returns the throughput of successful operations.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.successful_ops() as f64 / secs
        } else {
            0.0
        }
    }

    fn record(&mut self, result: &WriteResult<Option<WriteOutcome>>) {
        match result {
            Ok(Some(outcome)) => self.record_action(outcome.action),
            Ok(None) => {}
            Err(err) if err.code() == ErrorCode::VersionConflict => self.conflicts += 1,
            Err(_) => self.failed += 1,
        }
    }

    fn record_action(&mut self, action: Action) {
        match action {
            Action::Inserted => self.inserted += 1,
            Action::Updated => self.updated += 1,
            Action::Deleted | Action::None => {}
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Number of distinct features.
    pub feature_count: usize,
    /// Number of features per request (for batched tests).
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            feature_count: 1_000,
            batch_size: 100,
        }
    }
}

fn feature_id(i: usize, config: &StressConfig) -> String {
    format!("F{}", i % config.feature_count.max(1))
}

/// Run a sequential write stress test.
pub fn stress_sequential_writes(space: &TestSpace, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut result = StressTestResult::default();

    for i in 0..config.operations {
        let feature = Feature::new(feature_id(i, config)).with_property("n", i as i64);
        result.record(&space.write_feature(feature, None, &UpdateStrategy::new(), &[]));
    }

    result.duration = start.elapsed();
    result
}

/// Run a write stress test with `batch_size` features per request.
pub fn stress_batched_writes(space: &TestSpace, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut result = StressTestResult::default();
    let batch_size = config.batch_size.max(1);

    let mut next = 0usize;
    while next < config.operations {
        let end = (next + batch_size).min(config.operations);
        // Ids repeat across batches but never within one.
        let features = (next..end)
            .map(|i| Feature::new(format!("F{}", i % batch_size)).with_property("n", i as i64))
            .collect();
        match space.write_features(features, None, &UpdateStrategy::new(), &[], None) {
            Ok(collection) => {
                result.inserted += collection.inserted.len();
                result.updated += collection.updated.len();
                result.failed += collection.failed.len();
            }
            Err(_) => result.failed += end - next,
        }
        next = end;
    }

    result.duration = start.elapsed();
    result
}

/// Run concurrent read-modify-write increments of a shared counter.
///
/// Every thread reads `counter`, adds one and writes it back based on the
/// version it read, with version conflicts reported as errors. A thread
/// retries its increment until it goes through, so `updated` is the number
/// of increments and `conflicts` the number of lost races.
pub fn stress_concurrent_increments(space: &TestSpace, config: &StressConfig) -> StressTestResult {
    let id = "counter";
    space
        .write_feature(
            Feature::new(id).with_property("counter", 0),
            None,
            &UpdateStrategy::new(),
            &[],
        )
        .expect("Failed to create counter");

    let strategy = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Error);
    let per_thread = config.operations / config.threads.max(1);
    let updated = AtomicUsize::new(0);
    let conflicts = AtomicUsize::new(0);

    let start = Instant::now();
    thread::scope(|scope| {
        for _ in 0..config.threads.max(1) {
            scope.spawn(|| {
                for _ in 0..per_thread {
                    loop {
                        // Absent while another writer replaces the HEAD row.
                        let Some(current) =
                            space.read_feature(id).expect("Failed to read counter")
                        else {
                            thread::yield_now();
                            continue;
                        };
                        let value = current.properties.get("counter").and_then(Value::as_i64);
                        let base = current.version().expect("Counter has no version");
                        let change = Feature::new(id)
                            .with_property("counter", value.unwrap_or(0) + 1)
                            .with_base_version(base);
                        match space.write_feature(change, None, &strategy, &[]) {
                            Ok(_) => {
                                updated.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Err(err) if err.code() == ErrorCode::VersionConflict => {
                                conflicts.fetch_add(1, Ordering::Relaxed);
                                thread::yield_now();
                            }
                            Err(err) => panic!("Unexpected error: {err}"),
                        }
                    }
                }
            });
        }
    });

    StressTestResult {
        updated: updated.into_inner(),
        conflicts: conflicts.into_inner(),
        duration: start.elapsed(),
        ..StressTestResult::default()
    }
}

/// Run concurrent readers against a populated space.
pub fn stress_concurrent_reads(space: &TestSpace, config: &StressConfig) -> StressTestResult {
    for i in 0..config.feature_count {
        space
            .write_feature(
                Feature::new(format!("F{i}")).with_property("n", i as i64),
                None,
                &UpdateStrategy::new(),
                &[],
            )
            .expect("Failed to seed feature");
    }

    let per_thread = config.operations / config.threads.max(1);
    let reads = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..config.threads.max(1) {
            let reads = &reads;
            let failed = &failed;
            scope.spawn(move || {
                for i in 0..per_thread {
                    match space.read_feature(&feature_id(t * per_thread + i, config)) {
                        Ok(Some(_)) => reads.fetch_add(1, Ordering::Relaxed),
                        Ok(None) | Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult {
        reads: reads.into_inner(),
        failed: failed.into_inner(),
        duration: start.elapsed(),
        ..StressTestResult::default()
    }
}
