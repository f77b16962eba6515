//! History retention: partition creation and pruning of old versions.

use crate::config::EngineConfig;
use crate::error::WriteResult;
use geovault_storage::RowStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// What one maintenance run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Number of history partitions created.
    pub partitions_created: usize,
    /// Number of history rows removed.
    pub rows_pruned: usize,
}

/// Keeps the history of a space within its retention policy.
///
/// Maintenance is not conflict critical and may run at any time, but only
/// one run per maintainer is active at once.
pub struct HistoryMaintainer {
    store: Arc<dyn RowStore>,
    config: EngineConfig,
    running: Mutex<()>,
}

impl HistoryMaintainer {
    /// Creates a maintainer for the tables of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WriteError::InvalidConfig`] if `config` does not validate.
    pub fn new(store: Arc<dyn RowStore>, config: EngineConfig) -> WriteResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(store, config))
    }

    pub(crate) fn with_valid_config(store: Arc<dyn RowStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            running: Mutex::new(()),
        }
    }

    /// Runs one maintenance pass over every layer of the chain.
    ///
    /// For each table the partition holding the current version is created,
    /// and the next one as well once the current version is within the
    /// partition threshold of the boundary. With history enabled, rows that
    /// stopped being valid more than `versions_to_keep` versions ago are
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the row store fails.
    pub fn maintain(&self) -> WriteResult<MaintenanceReport> {
        let _guard = self.running.lock();
        let policy = self.config.retention;
        let mut report = MaintenanceReport::default();

        for layer in self.config.chain.layers() {
            let current = self.store.current_sequence(&layer.table)?;
            let partition = current / policy.partition_size;
            if self.store.ensure_partition(&layer.table, partition)? {
                report.partitions_created += 1;
            }
            let boundary = (partition + 1) * policy.partition_size;
            if boundary - current <= policy.partition_threshold
                && self.store.ensure_partition(&layer.table, partition + 1)?
            {
                report.partitions_created += 1;
            }

            if self.config.history {
                let keep_from = current + layer.base_version - policy.versions_to_keep;
                if keep_from > 0 {
                    let pruned = self.store.prune_history(&layer.table, keep_from)?;
                    report.rows_pruned += pruned;
                    if pruned > 0 {
                        debug!(table = %layer.table, keep_from, pruned, "pruned history");
                    }
                }
            }
        }
        Ok(report)
    }
}
