//! HEAD lookups across the layer chain.

use crate::error::WriteResult;
use crate::feature::is_tombstone;
use crate::layer::LayerChain;
use geovault_storage::{Row, RowStore};
use std::ops::Range;

/// A HEAD row found in some layer.
#[derive(Debug, Clone)]
pub(crate) struct Located {
    pub layer: usize,
    pub row: Row,
}

impl Located {
    pub fn is_live(&self) -> bool {
        !is_tombstone(&self.row)
    }
}

/// State of one id as seen from the target layer.
///
/// `target` is the HEAD row of the written layer. `base` is the first HEAD
/// row found below it in the read slice. A row in a higher layer hides every
/// layer below it, tombstones included.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub target: Option<Row>,
    pub base: Option<Located>,
}

impl Snapshot {
    /// Searches the chain for `id`.
    pub fn load(
        store: &dyn RowStore,
        chain: &LayerChain,
        slice: Range<usize>,
        target: usize,
        id: &str,
    ) -> WriteResult<Self> {
        let target_row = match chain.get(target) {
            Some(layer) => store.load_head(&layer.table, id)?,
            None => None,
        };
        let mut base = None;
        for index in (slice.start..target.min(slice.end)).rev() {
            let Some(layer) = chain.get(index) else {
                continue;
            };
            if let Some(row) = store.load_head(&layer.table, id)? {
                base = Some(Located { layer: index, row });
                break;
            }
        }
        Ok(Self {
            target: target_row,
            base,
        })
    }

    /// Returns the row a reader sees.
    pub fn visible(&self) -> Option<&Row> {
        self.target
            .as_ref()
            .or_else(|| self.base.as_ref().map(|located| &located.row))
    }

    /// Returns true if a reader sees a live feature.
    pub fn exists(&self) -> bool {
        self.visible().is_some_and(|row| !is_tombstone(row))
    }

    /// Returns true if the target layer holds a live HEAD row.
    pub fn target_live(&self) -> bool {
        self.target.as_ref().is_some_and(|row| !is_tombstone(row))
    }

    /// Returns true if a layer below the target holds a live feature.
    pub fn in_base(&self) -> bool {
        self.base.as_ref().is_some_and(Located::is_live)
    }
}

/// Loads the row of `id` valid at `version`, searching from `target` down.
pub(crate) fn load_at_version(
    store: &dyn RowStore,
    chain: &LayerChain,
    slice: Range<usize>,
    target: usize,
    id: &str,
    version: i64,
) -> WriteResult<Option<Row>> {
    for index in (slice.start..=target).rev() {
        let Some(layer) = chain.get(index) else {
            continue;
        };
        if let Some(row) = store.load_at_version(&layer.table, id, version)? {
            return Ok(Some(row));
        }
    }
    Ok(None)
}
