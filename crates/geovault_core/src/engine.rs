//! Write engine: the public entry point for feature writes.

use crate::batch::BatchedExecutor;
use crate::config::{EngineConfig, ErrorPolicy, ExecutionMode};
use crate::error::{WriteError, WriteResult};
use crate::feature::{Feature, META_NAMESPACE};
use crate::modification::FeatureModification;
use crate::outcome::{FailedWrite, FeatureCollection, WriteOutcome};
use crate::retention::HistoryMaintainer;
use crate::strategy::UpdateStrategy;
use crate::writer::{Completion, FeatureWriter, Step, WriteContext};
use geovault_diff::DiffOptions;
use geovault_storage::{Row, RowStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// A function applied to every incoming feature before it is written.
pub type Hook = Arc<dyn Fn(Feature) -> Feature + Send + Sync>;

type SlotResult = (usize, Option<String>, WriteResult<Option<WriteOutcome>>);

/// Writes features into a layered, versioned space.
///
/// The engine holds no locks. Concurrent writers are serialized by the row
/// store, so one engine can be shared between threads.
///
/// # Example
///
/// ```rust
/// use geovault_core::{Action, EngineConfig, Feature, LayerChain, UpdateStrategy, WriteEngine};
/// use geovault_storage::InMemoryRowStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryRowStore::with_tables(["roads"]));
/// let engine = WriteEngine::new(store, EngineConfig::new(LayerChain::single("roads"))).unwrap();
///
/// let feature = Feature::new("F1").with_property("b", 2);
/// let strategy = UpdateStrategy::new();
/// let first = engine.write_feature(feature.clone(), None, &strategy, &[]).unwrap().unwrap();
/// let second = engine.write_feature(feature, None, &strategy, &[]).unwrap().unwrap();
/// assert_eq!(first.action, Action::Inserted);
/// assert_eq!(second.action, Action::Updated);
/// ```
pub struct WriteEngine {
    store: Arc<dyn RowStore>,
    config: EngineConfig,
    options: DiffOptions,
}

impl WriteEngine {
    /// Creates an engine over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::InvalidConfig`] if the configuration is invalid.
    pub fn new(store: Arc<dyn RowStore>, config: EngineConfig) -> WriteResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            options: DiffOptions::for_features(META_NAMESPACE),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the row store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    fn context(&self) -> WriteResult<WriteContext<'_>> {
        WriteContext::new(self.store.as_ref(), &self.config, &self.options)
    }

    /// Allocates the version shared by all features of one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the row store cannot hand out a sequence value.
    pub fn allocate_version(&self) -> WriteResult<i64> {
        let layer = self
            .config
            .chain
            .target_index(self.config.context)
            .and_then(|index| self.config.chain.get(index))
            .ok_or_else(|| WriteError::invalid_config("no target layer for the space context"))?;
        Ok(self.store.next_sequence(&layer.table)? + layer.base_version)
    }

    /// Returns the feature a reader of this space sees.
    ///
    /// # Errors
    ///
    /// Returns an error if the row store fails or holds a malformed payload.
    pub fn read_feature(&self, id: &str) -> WriteResult<Option<Feature>> {
        self.context()?.read(id)
    }

    /// Returns the state of a feature at `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the row store fails or holds a malformed payload.
    pub fn read_feature_at(&self, id: &str, version: i64) -> WriteResult<Option<Feature>> {
        self.context()?.read_version(id, version)
    }

    /// Returns every row of a feature in the written layer, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the row store fails.
    pub fn history(&self, id: &str) -> WriteResult<Vec<Row>> {
        self.context()?.history(id)
    }

    /// Writes a single feature.
    ///
    /// Returns `None` if nothing visible changed, e.g. a retained feature
    /// or the deletion of an already deleted feature.
    ///
    /// # Errors
    ///
    /// Returns the error of the feature, regardless of the error policy.
    pub fn write_feature(
        &self,
        feature: Feature,
        author: Option<&str>,
        strategy: &UpdateStrategy,
        hooks: &[Hook],
    ) -> WriteResult<Option<WriteOutcome>> {
        let mut results = self.execute(vec![(feature, *strategy)], author, hooks, None, true)?;
        match results.pop() {
            Some((_, _, result)) => result,
            None => Ok(None),
        }
    }

    /// Writes features with one strategy and one shared version.
    ///
    /// A fresh version is allocated unless `version` is given.
    ///
    /// # Errors
    ///
    /// Returns the first feature error under [`ErrorPolicy::FailFast`], and
    /// row store failures that affect the whole request.
    pub fn write_features(
        &self,
        features: Vec<Feature>,
        author: Option<&str>,
        strategy: &UpdateStrategy,
        hooks: &[Hook],
        version: Option<i64>,
    ) -> WriteResult<FeatureCollection> {
        let requests = features
            .into_iter()
            .map(|feature| (feature, *strategy))
            .collect();
        self.write_requests(requests, author, hooks, version)
    }

    /// Writes several modifications, each with its own strategy, as one
    /// request with one shared version.
    ///
    /// # Errors
    ///
    /// Returns the first feature error under [`ErrorPolicy::FailFast`], and
    /// row store failures that affect the whole request.
    pub fn write_feature_modifications(
        &self,
        modifications: Vec<FeatureModification>,
        author: Option<&str>,
        version: Option<i64>,
    ) -> WriteResult<FeatureCollection> {
        let requests = modifications
            .into_iter()
            .flat_map(|modification| {
                let (features, strategy) = modification.into_features();
                features.into_iter().map(move |feature| (feature, strategy))
            })
            .collect();
        self.write_requests(requests, author, &[], version)
    }

    /// Returns a maintainer for the history of this space.
    #[must_use]
    pub fn history_maintainer(&self) -> HistoryMaintainer {
        HistoryMaintainer::with_valid_config(Arc::clone(&self.store), self.config.clone())
    }

    fn write_requests(
        &self,
        requests: Vec<(Feature, UpdateStrategy)>,
        author: Option<&str>,
        hooks: &[Hook],
        version: Option<i64>,
    ) -> WriteResult<FeatureCollection> {
        let fail_fast = self.config.error_policy == ErrorPolicy::FailFast;
        let results = self.execute(requests, author, hooks, version, fail_fast)?;

        let mut collection = FeatureCollection::new();
        for (index, id, result) in results {
            match result {
                Ok(Some(outcome)) => collection.push(outcome),
                Ok(None) => {}
                Err(error) if fail_fast => return Err(error),
                Err(error) => collection.push_failure(FailedWrite { index, id, error }),
            }
        }
        debug!(
            inserted = collection.inserted.len(),
            updated = collection.updated.len(),
            deleted = collection.deleted.len(),
            failed = collection.failed.len(),
            "request finished"
        );
        Ok(collection)
    }

    fn execute(
        &self,
        requests: Vec<(Feature, UpdateStrategy)>,
        author: Option<&str>,
        hooks: &[Hook],
        version: Option<i64>,
        fail_fast: bool,
    ) -> WriteResult<Vec<SlotResult>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let version = match version {
            Some(version) => version,
            None => self.allocate_version()?,
        };
        let author = author.unwrap_or(&self.config.default_author);
        let ctx = self.context()?;
        let mut session = Session::new(ctx, self.config.execution, requests.len());
        let mut seen = HashSet::new();

        debug!(version, features = requests.len(), "request started");
        for (slot, (feature, strategy)) in requests.into_iter().enumerate() {
            if fail_fast && session.failed() {
                break;
            }
            let feature = hooks.iter().fold(feature, |feature, hook| hook(feature));
            session.ids[slot] = feature.id.clone();
            let writer = match FeatureWriter::new(ctx, feature, version, author, &strategy) {
                Ok(writer) => writer,
                Err(err) => {
                    session.finish(slot, Err(err));
                    continue;
                }
            };
            session.ids[slot] = Some(writer.id().to_string());
            if !seen.insert(writer.id().to_string()) {
                let err = WriteError::illegal_argument(format!(
                    "feature {} appears more than once in the request",
                    writer.id()
                ));
                session.finish(slot, Err(err));
                continue;
            }
            session.drive(slot, writer)?;
        }
        session.flush()?;
        Ok(session.into_results())
    }
}

/// Drives the writers of one request through the executor.
struct Session<'a> {
    executor: BatchedExecutor<'a, Completion<'a>>,
    ids: Vec<Option<String>>,
    results: Vec<Option<WriteResult<Option<WriteOutcome>>>>,
}

impl<'a> Session<'a> {
    fn new(ctx: WriteContext<'a>, mode: ExecutionMode, size: usize) -> Self {
        Self {
            executor: BatchedExecutor::new(ctx.store, mode),
            ids: vec![None; size],
            results: std::iter::repeat_with(|| None).take(size).collect(),
        }
    }

    fn finish(&mut self, slot: usize, result: WriteResult<Option<WriteOutcome>>) {
        self.results[slot] = Some(result);
    }

    fn failed(&self) -> bool {
        self.results.iter().any(|result| matches!(result, Some(Err(_))))
    }

    fn drive(&mut self, slot: usize, mut writer: FeatureWriter<'a>) -> WriteResult<()> {
        loop {
            let write = match writer.run() {
                Ok(Step::Done(outcome)) => {
                    self.finish(slot, Ok(outcome));
                    return Ok(());
                }
                Ok(Step::Write(write)) => write,
                Err(err) => {
                    self.finish(slot, Err(err));
                    return Ok(());
                }
            };
            match self
                .executor
                .queue(slot, write.statement, write.params, write.handler)?
            {
                None => return Ok(()),
                Some(Completion::Finished(result)) => {
                    self.finish(slot, result);
                    return Ok(());
                }
                Some(Completion::Retry(next)) => writer = *next,
            }
        }
    }

    fn flush(&mut self) -> WriteResult<()> {
        while !self.executor.is_empty() {
            for (slot, completion) in self.executor.flush()? {
                match completion {
                    Completion::Finished(result) => self.finish(slot, result),
                    Completion::Retry(writer) => self.drive(slot, *writer)?,
                }
            }
        }
        Ok(())
    }

    fn into_results(self) -> Vec<SlotResult> {
        self.ids
            .into_iter()
            .zip(self.results)
            .enumerate()
            .filter_map(|(slot, (id, result))| result.map(|result| (slot, id, result)))
            .collect()
    }
}
