//! Layer chains of composite spaces.

use std::ops::Range;

/// One table of a layer chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Table name in the row store.
    pub table: String,
    /// Offset added to the table's sequence to form logical versions.
    pub base_version: i64,
}

impl Layer {
    /// Creates a layer without version offset.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            base_version: 0,
        }
    }

    /// Sets the version offset.
    #[must_use]
    pub fn with_base_version(mut self, base_version: i64) -> Self {
        self.base_version = base_version;
        self
    }
}

/// Which part of the chain a space is written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpaceContext {
    /// Write the most specific layer, read through the whole chain.
    #[default]
    Default,
    /// Write and read the most specific layer only.
    Extension,
    /// Write the layer below the most specific one, ignoring the extension.
    Super,
}

/// Which layers a read searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSlice {
    /// Every layer.
    Full,
    /// The most specific layer only.
    Extension,
    /// Every layer except the most specific one.
    Super,
}

/// Ordered tables of a space, index 0 being the most base layer.
///
/// A single table space is a chain of length one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerChain {
    layers: Vec<Layer>,
}

impl LayerChain {
    /// Creates a chain from base to most specific layer.
    #[must_use]
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Creates a chain with one table.
    pub fn single(table: impl Into<String>) -> Self {
        Self::new(vec![Layer::new(table)])
    }

    /// Creates a two layer chain: `extension` on top of `base`.
    pub fn composite(base: impl Into<String>, extension: impl Into<String>) -> Self {
        Self::new(vec![Layer::new(base), Layer::new(extension)])
    }

    /// Returns all layers, most base first.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if the chain has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns the layer at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Returns the index of the layer written in `context`.
    ///
    /// Returns `None` if the chain is too short for the context.
    #[must_use]
    pub fn target_index(&self, context: SpaceContext) -> Option<usize> {
        match context {
            SpaceContext::Default | SpaceContext::Extension => self.len().checked_sub(1),
            SpaceContext::Super => self.len().checked_sub(2),
        }
    }

    /// Returns the slice a read in `context` searches.
    #[must_use]
    pub fn read_slice(context: SpaceContext) -> ChainSlice {
        match context {
            SpaceContext::Default => ChainSlice::Full,
            SpaceContext::Extension => ChainSlice::Extension,
            SpaceContext::Super => ChainSlice::Super,
        }
    }

    /// Returns the index range of a slice.
    #[must_use]
    pub fn range(&self, slice: ChainSlice) -> Range<usize> {
        let len = self.len();
        match slice {
            ChainSlice::Full => 0..len,
            ChainSlice::Extension => len.saturating_sub(1)..len,
            ChainSlice::Super => 0..len.saturating_sub(1),
        }
    }
}
