//! Engine configuration.

use crate::error::{WriteError, WriteResult};
use crate::layer::{LayerChain, SpaceContext};
use std::collections::HashSet;

/// Author recorded when a request names none.
pub const DEFAULT_AUTHOR: &str = "ANONYMOUS";

/// When terminal row writes reach the row store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Every write is executed as soon as it is issued.
    #[default]
    Immediate,
    /// Writes of the same shape are collected and executed once per request.
    Deferred,
}

/// What a multi-feature request does when one feature fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Return the first error.
    #[default]
    FailFast,
    /// Record the failure in the collection and go on.
    Continue,
}

/// History retention settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Number of versions whose history is kept.
    pub versions_to_keep: i64,
    /// Number of versions per history partition.
    pub partition_size: i64,
    /// Distance to the partition boundary at which the next partition is created.
    pub partition_threshold: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            versions_to_keep: 10,
            partition_size: 100_000,
            partition_threshold: 10_000,
        }
    }
}

impl RetentionPolicy {
    /// Sets the number of versions to keep.
    #[must_use]
    pub const fn versions_to_keep(mut self, versions: i64) -> Self {
        self.versions_to_keep = versions;
        self
    }

    /// Sets the partition size.
    #[must_use]
    pub const fn partition_size(mut self, size: i64) -> Self {
        self.partition_size = size;
        self
    }

    /// Sets the partition threshold.
    #[must_use]
    pub const fn partition_threshold(mut self, threshold: i64) -> Self {
        self.partition_threshold = threshold;
        self
    }
}

/// Configuration of a [`crate::WriteEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tables of the space, most base first.
    pub chain: LayerChain,

    /// Which layer is written.
    pub context: SpaceContext,

    /// Whether history rows are kept.
    pub history: bool,

    /// Immediate or deferred row writes.
    pub execution: ExecutionMode,

    /// Author used when a request names none.
    pub default_author: String,

    /// Behaviour of multi-feature requests on failure.
    pub error_policy: ErrorPolicy,

    /// History retention.
    pub retention: RetentionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain: LayerChain::default(),
            context: SpaceContext::Default,
            history: true,
            execution: ExecutionMode::Immediate,
            default_author: DEFAULT_AUTHOR.to_string(),
            error_policy: ErrorPolicy::FailFast,
            retention: RetentionPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration for the given chain with default values.
    #[must_use]
    pub fn new(chain: LayerChain) -> Self {
        Self {
            chain,
            ..Self::default()
        }
    }

    /// Sets the space context.
    #[must_use]
    pub fn context(mut self, context: SpaceContext) -> Self {
        self.context = context;
        self
    }

    /// Sets whether history is kept.
    #[must_use]
    pub fn history(mut self, enabled: bool) -> Self {
        self.history = enabled;
        self
    }

    /// Sets the execution mode.
    #[must_use]
    pub fn execution(mut self, mode: ExecutionMode) -> Self {
        self.execution = mode;
        self
    }

    /// Sets the default author.
    #[must_use]
    pub fn default_author(mut self, author: impl Into<String>) -> Self {
        self.default_author = author.into();
        self
    }

    /// Sets the error policy.
    #[must_use]
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Sets the retention policy.
    #[must_use]
    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Checks the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::InvalidConfig`] if the chain is empty, the
    /// context needs more layers than the chain has, or a table name is
    /// empty or used twice.
    pub fn validate(&self) -> WriteResult<()> {
        if self.chain.is_empty() {
            return Err(WriteError::invalid_config("layer chain is empty"));
        }
        if self.chain.target_index(self.context).is_none() {
            return Err(WriteError::invalid_config(format!(
                "context {:?} requires at least two layers",
                self.context
            )));
        }
        let mut seen = HashSet::new();
        for layer in self.chain.layers() {
            if layer.table.is_empty() {
                return Err(WriteError::invalid_config("table name is empty"));
            }
            if !seen.insert(layer.table.as_str()) {
                return Err(WriteError::invalid_config(format!(
                    "table {} appears twice in the layer chain",
                    layer.table
                )));
            }
        }
        if self.retention.partition_size <= 0 || self.retention.versions_to_keep < 0 {
            return Err(WriteError::invalid_config(
                "retention needs a positive partition size and a non-negative version count",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::layer::Layer;

    #[test]
    fn default_config() {
        let config = EngineConfig::new(LayerChain::single("roads"));
        assert!(config.history);
        assert_eq!(config.execution, ExecutionMode::Immediate);
        assert_eq!(config.default_author, "ANONYMOUS");
        assert_eq!(config.error_policy, ErrorPolicy::FailFast);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new(LayerChain::composite("base", "ext"))
            .context(SpaceContext::Super)
            .history(false)
            .execution(ExecutionMode::Deferred)
            .default_author("bob")
            .retention(RetentionPolicy::default().versions_to_keep(3));

        assert_eq!(config.context, SpaceContext::Super);
        assert!(!config.history);
        assert_eq!(config.default_author, "bob");
        assert_eq!(config.retention.versions_to_keep, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_broken_chains() {
        let empty = EngineConfig::default();
        assert_eq!(empty.validate().unwrap_err().code(), ErrorCode::InvalidConfig);

        let single_super = EngineConfig::new(LayerChain::single("t")).context(SpaceContext::Super);
        assert!(single_super.validate().is_err());

        let duplicate = EngineConfig::new(LayerChain::composite("t", "t"));
        assert!(duplicate.validate().is_err());

        let unnamed = EngineConfig::new(LayerChain::new(vec![Layer::new("")]));
        assert!(unnamed.validate().is_err());
    }
}
