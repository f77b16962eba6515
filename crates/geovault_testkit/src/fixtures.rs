//! Test spaces and invariant checks.
//!
//! Provides convenience functions for setting up engines over the
//! in-memory row store and common test scenarios.

use geovault_core::{
    EngineConfig, Feature, Layer, LayerChain, SpaceContext, UpdateStrategy, WriteEngine,
    WriteOutcome,
};
use geovault_storage::{InMemoryRowStore, RowStore, MAX_VERSION};
use serde_json::json;
use std::sync::Arc;

/// Table of a single layer test space.
pub const ROADS: &str = "roads";

/// Base table of a composite test space.
pub const ROADS_BASE: &str = "roads_base";

/// Extension table of a composite test space.
pub const ROADS_EXTENSION: &str = "roads_ext";

/// A write engine over a fresh in-memory row store.
pub struct TestSpace {
    /// The engine under test.
    pub engine: WriteEngine,
    /// The row store, for direct inspection.
    pub memory: Arc<InMemoryRowStore>,
}

impl TestSpace {
    /// Creates a single layer space over [`ROADS`] with history.
    pub fn single() -> Self {
        Self::with_config(EngineConfig::new(LayerChain::single(ROADS)))
    }

    /// Creates a single layer space that keeps no history rows.
    pub fn without_history() -> Self {
        Self::with_config(EngineConfig::new(LayerChain::single(ROADS)).history(false))
    }

    /// Creates a two layer space over [`ROADS_BASE`] and [`ROADS_EXTENSION`].
    pub fn composite(context: SpaceContext) -> Self {
        Self::with_config(EngineConfig::new(composite_chain()).context(context))
    }

    /// Creates a two layer space that keeps no history rows.
    pub fn composite_without_history(context: SpaceContext) -> Self {
        let config = EngineConfig::new(composite_chain())
            .context(context)
            .history(false);
        Self::with_config(config)
    }

    /// Creates a space for `config`, creating every table of its chain.
    pub fn with_config(config: EngineConfig) -> Self {
        let memory = Arc::new(InMemoryRowStore::new());
        for layer in config.chain.layers() {
            memory.create_table(layer.table.clone());
        }
        let engine = WriteEngine::new(memory.clone(), config).expect("Invalid test config");
        Self { engine, memory }
    }

    /// Returns the table the engine writes to.
    pub fn target_table(&self) -> &str {
        let config = self.engine.config();
        let index = config
            .chain
            .target_index(config.context)
            .expect("Test space has no target layer");
        &config.chain.layers()[index].table
    }

    /// Writes a feature with the default strategy and returns its outcome.
    pub fn put(&self, feature: Feature) -> WriteOutcome {
        self.write_feature(feature, None, &UpdateStrategy::new(), &[])
            .expect("Failed to write feature")
            .expect("Write was skipped")
    }

    /// Writes a feature to another layer of the same row store.
    ///
    /// Used to seed base layers of composite spaces.
    pub fn put_in(&self, context: SpaceContext, feature: Feature) -> Option<WriteOutcome> {
        let config = self.engine.config().clone().context(context);
        let engine = WriteEngine::new(self.memory.clone(), config).expect("Invalid test config");
        engine
            .write_feature(feature, None, &UpdateStrategy::new(), &[])
            .expect("Failed to write feature")
    }
}

fn composite_chain() -> LayerChain {
    LayerChain::new(vec![Layer::new(ROADS_BASE), Layer::new(ROADS_EXTENSION)])
}

impl std::ops::Deref for TestSpace {
    type Target = WriteEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test with a fresh single layer space.
///
/// # Example
///
/// ```rust
/// use geovault_testkit::with_space;
///
/// with_space(|space| {
///     assert!(space.read_feature("missing").unwrap().is_none());
/// });
/// ```
pub fn with_space<F, R>(f: F) -> R
where
    F: FnOnce(&TestSpace) -> R,
{
    let space = TestSpace::single();
    f(&space)
}

/// Asserts the version range invariants for the rows of `id` in `table`.
///
/// Every row has a non-empty range, ranges are ordered and never overlap,
/// and only the last row may be HEAD.
pub fn check_version_ranges(store: &dyn RowStore, table: &str, id: &str) {
    let rows = store.history(table, id).expect("Failed to load history");
    for row in &rows {
        assert!(
            row.version < row.next_version,
            "Empty range [{}, {}) for {id}",
            row.version,
            row.next_version
        );
    }
    for pair in rows.windows(2) {
        assert!(
            pair[0].next_version <= pair[1].version,
            "Overlapping ranges for {id}: [{}, {}) and [{}, {})",
            pair[0].version,
            pair[0].next_version,
            pair[1].version,
            pair[1].next_version
        );
    }
    let heads = rows.iter().filter(|row| row.next_version == MAX_VERSION).count();
    assert!(heads <= 1, "{heads} HEAD rows for {id}");
    if heads == 1 {
        assert!(rows.last().is_some_and(|row| row.is_head()), "HEAD of {id} is not the newest row");
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Returns a road with a line geometry.
    pub fn road(id: &str, name: &str, lanes: i64) -> Feature {
        Feature::new(id)
            .with_property("name", name)
            .with_property("lanes", lanes)
            .with_geometry(json!({
                "type": "LineString",
                "coordinates": [[8.68, 50.11], [8.69, 50.12]]
            }))
    }

    /// Creates a space holding `count` roads named `road-<i>`.
    pub fn populated_space(count: usize) -> TestSpace {
        let space = TestSpace::single();
        let roads = (0..count)
            .map(|i| road(&format!("road-{i}"), &format!("Road {i}"), 2))
            .collect();
        space
            .write_features(roads, Some("seed"), &UpdateStrategy::new(), &[], None)
            .expect("Failed to seed roads");
        space
    }

    /// Creates a composite space whose base layer holds `road-0`.
    pub fn extended_space(context: SpaceContext) -> TestSpace {
        let space = TestSpace::composite(context);
        space.put_in(SpaceContext::Super, road("road-0", "Main St", 2));
        space
    }
}
