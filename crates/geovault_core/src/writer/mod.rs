//! Feature Writer: the write state machine of a single feature.
//!
//! A writer resolves one feature against the current state of the layer
//! chain and ends in at most one terminal row write. Reads and HEAD
//! retirements run immediately. The terminal write is handed back as
//! [`Step::Write`] so that the caller can batch it with the terminal writes
//! of sibling features; its handler turns the row result into a
//! [`Completion`].
//!
//! ## States
//!
//! ```text
//!  run ─┬─ delete ──┬─ direct row delete
//!       │           └─ tombstone ─┐
//!       └─ write ◄────────────────┘
//!            ├─ history:    retire HEAD ─► append row
//!            └─ no history: update row | upsert row
//!  version conflict ─► merge ─► write
//!                 └──► merge conflict
//! ```

mod chain;
mod classify;

use crate::config::EngineConfig;
use crate::error::{WriteError, WriteResult};
use crate::feature::{is_tombstone, random_id, Feature, CREATED_AT_POINTER, META_NAMESPACE};
use crate::layer::{LayerChain, SpaceContext};
use crate::outcome::{Action, WriteOutcome};
use crate::strategy::{
    ExistsPolicy, MergeConflictPolicy, NotExistsPolicy, UpdateStrategy, VersionConflictPolicy,
};
use chain::{load_at_version, Snapshot};
use classify::{history_operation, update_operation, upsert_operation};
use geovault_diff::{diff, Conflict, DiffOptions};
use geovault_storage::{
    DeletePredicate, Operation, RetireGuard, Row, RowParams, RowResult, RowStore, StorageError,
    StorageResult, UpsertConflict, WriteStatement,
};
use serde_json::Value;
use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

/// Number of runs after which a contended write gives up.
pub(crate) const MAX_ATTEMPTS: u32 = 16;

/// Number of reloads spent waiting for a retired HEAD to be replaced.
const IN_FLIGHT_SPINS: u32 = 1_000;

/// Everything a writer needs besides the feature.
#[derive(Clone, Copy)]
pub(crate) struct WriteContext<'a> {
    pub store: &'a dyn RowStore,
    pub config: &'a EngineConfig,
    pub options: &'a DiffOptions,
    target: usize,
    table: &'a str,
}

impl<'a> WriteContext<'a> {
    pub fn new(
        store: &'a dyn RowStore,
        config: &'a EngineConfig,
        options: &'a DiffOptions,
    ) -> WriteResult<Self> {
        let target = config
            .chain
            .target_index(config.context)
            .ok_or_else(|| WriteError::invalid_config("no target layer for the space context"))?;
        let table = config
            .chain
            .get(target)
            .map(|layer| layer.table.as_str())
            .ok_or_else(|| WriteError::invalid_config("no target layer for the space context"))?;
        Ok(Self {
            store,
            config,
            options,
            target,
            table,
        })
    }

    fn slice(&self) -> Range<usize> {
        self.config
            .chain
            .range(LayerChain::read_slice(self.config.context))
    }

    fn snapshot(&self, id: &str) -> WriteResult<Snapshot> {
        Snapshot::load(self.store, &self.config.chain, self.slice(), self.target, id)
    }

    /// Returns the feature a reader sees, `None` if absent or deleted.
    pub fn read(&self, id: &str) -> WriteResult<Option<Feature>> {
        match self.snapshot(id)?.visible() {
            Some(row) if !is_tombstone(row) => Feature::from_row(row).map(Some),
            _ => Ok(None),
        }
    }

    /// Returns the feature as it was at `version`, tombstones included.
    pub fn read_version(&self, id: &str, version: i64) -> WriteResult<Option<Feature>> {
        load_at_version(
            self.store,
            &self.config.chain,
            self.slice(),
            self.target,
            id,
            version,
        )?
        .map(|row| Feature::from_row(&row))
        .transpose()
    }

    /// Returns every row of `id` in the written layer.
    pub fn history(&self, id: &str) -> WriteResult<Vec<Row>> {
        Ok(self.store.history(self.table, id)?)
    }
}

/// Turns the row result of a terminal write into a completion.
pub(crate) type Handler<'a> = Box<dyn FnOnce(StorageResult<RowResult>) -> Completion<'a> + 'a>;

/// A terminal row write together with its result handler.
pub(crate) struct TerminalWrite<'a> {
    pub statement: WriteStatement,
    pub params: RowParams,
    pub handler: Handler<'a>,
}

/// What a writer run ends in.
pub(crate) enum Step<'a> {
    /// The writer finished without a terminal write.
    Done(Option<WriteOutcome>),
    /// The writer waits for a terminal write.
    Write(TerminalWrite<'a>),
}

/// What a terminal write ends in.
pub(crate) enum Completion<'a> {
    /// The feature is done.
    Finished(WriteResult<Option<WriteOutcome>>),
    /// The write lost a race and must run again.
    Retry(Box<FeatureWriter<'a>>),
}

/// Write state machine of one feature.
pub(crate) struct FeatureWriter<'a> {
    ctx: WriteContext<'a>,
    id: String,
    version: i64,
    author: String,
    strategy: UpdateStrategy,
    input: Feature,
    /// Partial payload, patched onto the current HEAD on every run.
    partial: Option<Value>,
    base_version: Option<i64>,
    is_delete: bool,
    on_exists: ExistsPolicy,
    on_not_exists: NotExistsPolicy,
    on_version_conflict: Option<VersionConflictPolicy>,
    conflicting: bool,
    snapshot: Option<Snapshot>,
    pending_conflict: bool,
    attempts: u32,
}

impl<'a> FeatureWriter<'a> {
    /// Creates a writer for an enriched feature.
    pub fn new(
        ctx: WriteContext<'a>,
        mut feature: Feature,
        version: i64,
        author: &str,
        strategy: &UpdateStrategy,
    ) -> WriteResult<Self> {
        let is_delete = feature.is_deleted();
        strategy.validate(ctx.config.history, is_delete)?;

        let id = match feature.id.take() {
            Some(id) if id.is_empty() => {
                return Err(WriteError::illegal_argument("feature id must not be empty"))
            }
            Some(id) => id,
            None if is_delete => {
                return Err(WriteError::illegal_argument("a deleted feature needs an id"))
            }
            None => random_id(),
        };
        feature.id = Some(id.clone());

        let partial = (strategy.partial && !is_delete).then(|| partial_payload(&feature));
        Ok(Self {
            ctx,
            id,
            version,
            author: author.to_string(),
            strategy: *strategy,
            base_version: feature.meta.version,
            input: feature,
            partial,
            is_delete,
            on_exists: strategy.on_exists,
            on_not_exists: strategy.not_exists_policy(),
            on_version_conflict: strategy.version_conflict_policy(is_delete),
            conflicting: false,
            snapshot: None,
            pending_conflict: false,
            attempts: 0,
        })
    }

    /// Returns the feature id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Runs the writer until it finishes or issues its terminal write.
    pub fn run(mut self) -> WriteResult<Step<'a>> {
        self.attempts += 1;
        if self.attempts > MAX_ATTEMPTS {
            warn!(id = %self.id, attempts = MAX_ATTEMPTS, "giving up on contended feature");
            let head = self.ctx.store.load_head(self.ctx.table, &self.id)?;
            return Err(self.version_conflict(head.map(|row| row.version)));
        }
        if self.pending_conflict {
            self.pending_conflict = false;
            self.invalidate();
            let head = self.snapshot()?.target;
            return self.handle_version_conflict(head);
        }
        if self.is_delete {
            self.delete()
        } else {
            self.write()
        }
    }

    fn rerun(mut self) -> WriteResult<Step<'a>> {
        self.invalidate();
        self.run()
    }

    fn snapshot(&mut self) -> WriteResult<Snapshot> {
        if let Some(snapshot) = &self.snapshot {
            return Ok(snapshot.clone());
        }
        let snapshot = self.ctx.snapshot(&self.id)?;
        self.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn invalidate(&mut self) {
        self.snapshot = None;
    }

    fn detects_conflicts(&self) -> bool {
        self.on_version_conflict.is_some() && self.base_version.is_some()
    }

    fn check_base_version(&mut self, exists: bool) -> WriteResult<()> {
        if self.on_version_conflict.is_none() || self.base_version.is_some() {
            return Ok(());
        }
        if exists {
            return Err(WriteError::illegal_argument(format!(
                "feature {} exists, conflict detection needs the base version of the change",
                self.id
            )));
        }
        self.on_version_conflict = None;
        Ok(())
    }

    fn delete(mut self) -> WriteResult<Step<'a>> {
        let snapshot = self.snapshot()?;
        self.check_base_version(snapshot.exists())?;
        let history = self.ctx.config.history;
        match self.ctx.config.context {
            SpaceContext::Default => {
                self.on_exists = ExistsPolicy::Replace;
                self.on_not_exists = NotExistsPolicy::Create;
                if !history && snapshot.target_live() && !snapshot.in_base() {
                    return Ok(self.delete_row());
                }
            }
            SpaceContext::Extension | SpaceContext::Super => {
                if !history {
                    return Ok(self.delete_row());
                }
                self.on_exists = ExistsPolicy::Delete;
                if self.on_not_exists != NotExistsPolicy::Error {
                    self.on_not_exists = NotExistsPolicy::Retain;
                }
            }
        }
        let mut tombstone = Feature::tombstone(self.id.clone());
        tombstone.meta.version = self.base_version;
        self.input = tombstone;
        self.partial = None;
        trace!(id = %self.id, "delete continues as tombstone write");
        self.write()
    }

    fn write(mut self) -> WriteResult<Step<'a>> {
        let snapshot = self.snapshot()?;
        let exists = snapshot.exists();
        self.check_base_version(exists)?;

        if !exists {
            if self.is_delete {
                trace!(id = %self.id, "feature is already deleted");
                return self.not_found(self.on_not_exists).map(Step::Done);
            }
            match self.on_not_exists {
                NotExistsPolicy::Create => {}
                policy => return self.not_found(policy).map(Step::Done),
            }
        } else if !self.is_delete {
            match self.on_exists {
                ExistsPolicy::Replace => {}
                ExistsPolicy::Retain => {
                    trace!(id = %self.id, "feature exists, retained");
                    return Ok(Step::Done(None));
                }
                ExistsPolicy::Error => {
                    return Err(WriteError::FeatureExists {
                        id: self.id,
                        operation: Operation::Insert,
                        source: None,
                    })
                }
                ExistsPolicy::Delete => {
                    self.is_delete = true;
                    self.on_version_conflict = self.strategy.version_conflict_policy(true);
                    return self.delete();
                }
            }
        }

        let feature = self.resolve(&snapshot)?;
        if self.ctx.config.history {
            self.write_history(feature, &snapshot)
        } else {
            self.write_single(feature, &snapshot)
        }
    }

    /// Builds the feature to write: the input, or the partial payload
    /// patched onto the visible HEAD.
    fn resolve(&self, snapshot: &Snapshot) -> WriteResult<Feature> {
        let feature = match &self.partial {
            Some(payload) => {
                let base = match snapshot.visible().filter(|row| !is_tombstone(row)) {
                    Some(row) => Feature::from_row(row)?.to_value(),
                    None => Feature::new(self.id.clone()).to_value(),
                };
                Feature::from_value(geovault_diff::patch(&base, payload))?
            }
            None => self.input.clone(),
        };
        Ok(self.stamp(feature))
    }

    fn stamp(&self, mut feature: Feature) -> Feature {
        let now = now_millis();
        feature.id = Some(self.id.clone());
        feature.meta.version = Some(self.version);
        feature.meta.author = Some(self.author.clone());
        feature.meta.updated_at = Some(now);
        // Replaced by the previous value when the row store preserves it.
        feature.meta.created_at = Some(now);
        feature.meta.conflicting = self.conflicting;
        feature
    }

    fn write_history(mut self, feature: Feature, snapshot: &Snapshot) -> WriteResult<Step<'a>> {
        let guard = match (self.on_version_conflict, self.base_version) {
            (Some(_), Some(base)) => RetireGuard::VersionEquals(base),
            _ => RetireGuard::VersionBelow(self.version),
        };
        let retired = self
            .ctx
            .store
            .retire_head(self.ctx.table, &self.id, guard, self.version)?;
        if let Some(retired) = retired {
            trace!(id = %self.id, retired = retired.version, version = self.version, "retired HEAD row");
            let prev_live = !is_tombstone(&retired);
            return Ok(self.append(feature, prev_live, snapshot.in_base()));
        }

        self.invalidate();
        let mut current = self.snapshot()?;
        if current.target.is_none()
            && !self.ctx.store.history(self.ctx.table, &self.id)?.is_empty()
        {
            current = self.await_head()?;
        }

        match current.target {
            Some(head) => {
                if self.on_version_conflict.is_some() {
                    return self.handle_version_conflict(Some(head));
                }
                if head.version < self.version {
                    return self.rerun();
                }
                Err(self.version_conflict(Some(head.version)))
            }
            None => {
                if let Some(head) = self.stale_base(&current) {
                    return self.handle_version_conflict(Some(head));
                }
                let in_base = current.in_base();
                Ok(self.append(feature, false, in_base))
            }
        }
    }

    /// Waits for a concurrent writer to append the row behind a HEAD it retired.
    fn await_head(&mut self) -> WriteResult<Snapshot> {
        for _ in 0..IN_FLIGHT_SPINS {
            std::thread::yield_now();
            self.invalidate();
            let snapshot = self.snapshot()?;
            if snapshot.target.is_some() {
                return Ok(snapshot);
            }
        }
        warn!(id = %self.id, "retired HEAD row was never replaced");
        Err(self.version_conflict(None))
    }

    fn append(self, feature: Feature, prev_live: bool, in_base: bool) -> Step<'a> {
        let (operation, visible) = history_operation(feature.is_deleted(), prev_live, in_base);
        let statement = WriteStatement::InsertHistoryRow {
            table: self.ctx.table.to_string(),
            preserve: prev_live.then(|| CREATED_AT_POINTER.to_string()),
        };
        let params = RowParams::write(self.row(&feature, operation));
        let mut writer = self;
        let handler: Handler<'a> = Box::new(move |result| match result {
            Ok(RowResult::Inserted { preserved }) => {
                let outcome = writer.outcome(feature, operation, preserved);
                Completion::Finished(Ok(visible.then_some(outcome)))
            }
            Ok(other) => Completion::Finished(Err(unexpected("insert_history_row", &other))),
            Err(err) if err.is_unique_violation() => {
                debug!(id = %writer.id, "concurrent insert of HEAD row, retrying");
                writer.invalidate();
                Completion::Retry(Box::new(writer))
            }
            Err(err) => Completion::Finished(Err(err.into())),
        });
        Step::Write(TerminalWrite {
            statement,
            params,
            handler,
        })
    }

    fn write_single(mut self, feature: Feature, snapshot: &Snapshot) -> WriteResult<Step<'a>> {
        let tombstone = feature.is_deleted();
        let in_base = snapshot.in_base();

        if let (Some(_), Some(base)) = (self.on_version_conflict, self.base_version) {
            if let Some(target) = &snapshot.target {
                let live = !is_tombstone(target);
                let operation = if live {
                    update_operation(tombstone, in_base)
                } else {
                    upsert_operation(tombstone, in_base)
                };
                let statement = WriteStatement::UpdateRow {
                    table: self.ctx.table.to_string(),
                    preserve: live.then(|| CREATED_AT_POINTER.to_string()),
                };
                let params = RowParams::update(self.row(&feature, operation), base);
                let mut writer = self;
                let handler: Handler<'a> = Box::new(move |result| match result {
                    Ok(RowResult::Updated { preserved }) => {
                        Completion::Finished(Ok(Some(writer.outcome(feature, operation, preserved))))
                    }
                    Ok(RowResult::NotMatched) => {
                        writer.pending_conflict = true;
                        Completion::Retry(Box::new(writer))
                    }
                    Ok(other) => Completion::Finished(Err(unexpected("update_row", &other))),
                    Err(err) => Completion::Finished(Err(err.into())),
                });
                return Ok(Step::Write(TerminalWrite {
                    statement,
                    params,
                    handler,
                }));
            }
            if let Some(head) = self.stale_base(snapshot) {
                return self.handle_version_conflict(Some(head));
            }
            self.on_version_conflict = None;
        }

        // A tombstone hides the feature, so existence policies do not apply.
        if let Some(hidden) = snapshot.target.as_ref().filter(|row| is_tombstone(row)) {
            return Ok(self.replace_tombstone(feature, hidden.version, in_base));
        }

        let on_conflict = match self.on_exists {
            ExistsPolicy::Replace | ExistsPolicy::Delete => UpsertConflict::Replace,
            ExistsPolicy::Retain => UpsertConflict::Retain,
            ExistsPolicy::Error => UpsertConflict::Error,
        };
        let statement = WriteStatement::UpsertRow {
            table: self.ctx.table.to_string(),
            on_conflict,
            preserve: Some(CREATED_AT_POINTER.to_string()),
        };
        let params = RowParams::write(self.row(&feature, upsert_operation(tombstone, in_base)));
        let writer = self;
        let handler: Handler<'a> = Box::new(move |result| match result {
            Ok(RowResult::Upserted {
                operation,
                preserved,
            }) => Completion::Finished(Ok(Some(writer.outcome(feature, operation, preserved)))),
            Ok(RowResult::Skipped) => Completion::Finished(Ok(None)),
            Ok(other) => Completion::Finished(Err(unexpected("upsert_row", &other))),
            Err(err) if err.is_unique_violation() && on_conflict == UpsertConflict::Error => {
                Completion::Finished(Err(WriteError::FeatureExists {
                    id: writer.id,
                    operation: Operation::Insert,
                    source: Some(err),
                }))
            }
            Err(err) => Completion::Finished(Err(err.into())),
        });
        Ok(Step::Write(TerminalWrite {
            statement,
            params,
            handler,
        }))
    }

    /// Overwrites the tombstone HEAD at `expected` with a new live row.
    fn replace_tombstone(self, feature: Feature, expected: i64, in_base: bool) -> Step<'a> {
        let operation = upsert_operation(feature.is_deleted(), in_base);
        let statement = WriteStatement::UpdateRow {
            table: self.ctx.table.to_string(),
            preserve: None,
        };
        let params = RowParams::update(self.row(&feature, operation), expected);
        let mut writer = self;
        let handler: Handler<'a> = Box::new(move |result| match result {
            Ok(RowResult::Updated { preserved }) => {
                Completion::Finished(Ok(Some(writer.outcome(feature, operation, preserved))))
            }
            Ok(RowResult::NotMatched) => {
                debug!(id = %writer.id, "tombstone replaced concurrently, retrying");
                writer.invalidate();
                Completion::Retry(Box::new(writer))
            }
            Ok(other) => Completion::Finished(Err(unexpected("update_row", &other))),
            Err(err) => Completion::Finished(Err(err.into())),
        });
        Step::Write(TerminalWrite {
            statement,
            params,
            handler,
        })
    }

    /// Returns the live base layer HEAD when it moved past the base version
    /// of the change.
    fn stale_base(&self, snapshot: &Snapshot) -> Option<Row> {
        let base = self.base_version.filter(|_| self.on_version_conflict.is_some())?;
        snapshot
            .base
            .as_ref()
            .filter(|located| located.is_live() && located.row.version != base)
            .map(|located| located.row.clone())
    }

    fn delete_row(self) -> Step<'a> {
        let detect = self.detects_conflicts();
        let predicate = if detect {
            DeletePredicate::VersionEquals
        } else {
            DeletePredicate::AllVersions
        };
        let statement = WriteStatement::DeleteRow {
            table: self.ctx.table.to_string(),
            predicate,
        };
        let params = RowParams::delete(self.id.clone(), self.base_version.filter(|_| detect));
        let mut writer = self;
        let handler: Handler<'a> = Box::new(move |result| match result {
            Ok(RowResult::Deleted(0)) if detect => {
                writer.pending_conflict = true;
                Completion::Retry(Box::new(writer))
            }
            Ok(RowResult::Deleted(0)) => {
                Completion::Finished(writer.not_found(writer.on_not_exists))
            }
            Ok(RowResult::Deleted(_)) => {
                let tombstone = writer.stamp(Feature::tombstone(writer.id.clone()));
                Completion::Finished(Ok(Some(writer.outcome(tombstone, Operation::Delete, None))))
            }
            Ok(other) => Completion::Finished(Err(unexpected("delete_row", &other))),
            Err(err) => Completion::Finished(Err(err.into())),
        });
        Step::Write(TerminalWrite {
            statement,
            params,
            handler,
        })
    }

    fn handle_version_conflict(mut self, head: Option<Row>) -> WriteResult<Step<'a>> {
        let policy = self
            .on_version_conflict
            .unwrap_or(VersionConflictPolicy::Error);
        debug!(
            id = %self.id,
            base = ?self.base_version,
            head = ?head.as_ref().map(|row| row.version),
            ?policy,
            "version conflict"
        );

        if self.is_delete {
            let Some(head) = head.filter(|row| !is_tombstone(row)) else {
                return Ok(Step::Done(None));
            };
            return match policy {
                VersionConflictPolicy::Merge => {
                    self.handle_merge_conflict(vec![deleted_conflict(true, false)])
                }
                VersionConflictPolicy::Error => Err(self.version_conflict(Some(head.version))),
                VersionConflictPolicy::Replace => {
                    self.on_version_conflict = None;
                    self.rerun()
                }
                VersionConflictPolicy::Retain => Ok(Step::Done(None)),
            };
        }

        match policy {
            VersionConflictPolicy::Merge => match head {
                Some(head) => self.merge(head),
                None => Err(self.version_conflict(None)),
            },
            VersionConflictPolicy::Error => Err(self.version_conflict(head.map(|row| row.version))),
            VersionConflictPolicy::Replace => {
                self.on_version_conflict = None;
                self.rerun()
            }
            VersionConflictPolicy::Retain => Ok(Step::Done(None)),
        }
    }

    /// Three-way merges the incoming change into `head`.
    fn merge(mut self, head: Row) -> WriteResult<Step<'a>> {
        if is_tombstone(&head) {
            return self.handle_merge_conflict(vec![deleted_conflict(false, true)]);
        }
        let Some(base_version) = self.base_version else {
            return Err(self.version_conflict(Some(head.version)));
        };

        let base = load_at_version(
            self.ctx.store,
            &self.ctx.config.chain,
            self.ctx.slice(),
            self.ctx.target,
            &self.id,
            base_version,
        )?
        .map(|row| Feature::from_row(&row))
        .transpose()?
        .unwrap_or_else(|| Feature::new(self.id.clone()))
        .to_value();
        let head_value = Feature::from_row(&head)?.to_value();
        let input_diff = match &self.partial {
            Some(payload) => payload.clone(),
            None => diff(&base, &self.input.to_value(), self.ctx.options),
        };

        match geovault_diff::merge(&base, &head_value, &input_diff, self.ctx.options) {
            Ok(merged) => {
                debug!(id = %self.id, base = base_version, head = head.version, "merged concurrent change");
                self.input = Feature::from_value(merged)?;
                self.partial = None;
                self.on_version_conflict = None;
                self.rerun()
            }
            Err(conflicts) => self.handle_merge_conflict(conflicts),
        }
    }

    fn handle_merge_conflict(mut self, conflicts: Vec<Conflict>) -> WriteResult<Step<'a>> {
        let policy = self.strategy.on_merge_conflict;
        debug!(id = %self.id, conflicts = conflicts.len(), ?policy, "merge conflict");
        match policy {
            MergeConflictPolicy::Error => Err(WriteError::MergeConflict {
                id: self.id.clone(),
                operation: self.operation(),
                conflicts,
            }),
            MergeConflictPolicy::Replace => {
                self.on_version_conflict = None;
                self.rerun()
            }
            MergeConflictPolicy::Retain => Ok(Step::Done(None)),
            MergeConflictPolicy::Continue => {
                self.conflicting = true;
                self.on_version_conflict = None;
                self.rerun()
            }
        }
    }

    fn not_found(&self, policy: NotExistsPolicy) -> WriteResult<Option<WriteOutcome>> {
        match policy {
            NotExistsPolicy::Error => Err(WriteError::FeatureNotExists {
                id: self.id.clone(),
                operation: self.operation(),
            }),
            NotExistsPolicy::Create | NotExistsPolicy::Retain => Ok(None),
        }
    }

    /// Operation named in errors.
    fn operation(&self) -> Operation {
        if self.is_delete {
            Operation::Delete
        } else if self.partial.is_some() || self.base_version.is_some() {
            Operation::Update
        } else {
            Operation::Insert
        }
    }

    fn version_conflict(&self, head_version: Option<i64>) -> WriteError {
        WriteError::VersionConflict {
            id: self.id.clone(),
            operation: self.operation(),
            base_version: self.base_version,
            head_version,
        }
    }

    fn row(&self, feature: &Feature, operation: Operation) -> Row {
        let (payload, geometry) = feature.to_row_parts();
        Row::head(
            self.id.clone(),
            self.version,
            operation,
            self.author.clone(),
            payload,
            geometry,
        )
    }

    fn outcome(&self, mut feature: Feature, operation: Operation, preserved: Option<Value>) -> WriteOutcome {
        if let Some(created_at) = preserved.as_ref().and_then(Value::as_i64) {
            feature.meta.created_at = Some(created_at);
        }
        let action = Action::from_operation(operation, feature.is_deleted());
        debug!(id = %self.id, version = self.version, %operation, ?action, "feature written");
        WriteOutcome {
            action,
            feature,
            version: self.version,
            author: self.author.clone(),
        }
    }
}

/// The incoming feature as a patch: no id, no metadata.
fn partial_payload(feature: &Feature) -> Value {
    let mut payload = feature.to_value();
    if let Value::Object(root) = &mut payload {
        root.remove("type");
        root.remove("id");
        if let Some(Value::Object(properties)) = root.get_mut("properties") {
            properties.remove(META_NAMESPACE);
        }
    }
    payload
}

fn deleted_conflict(ours: bool, theirs: bool) -> Conflict {
    Conflict {
        path: format!("properties.{META_NAMESPACE}.deleted"),
        ours: Value::Bool(ours),
        theirs: Value::Bool(theirs),
    }
}

fn unexpected(statement: &str, result: &RowResult) -> WriteError {
    WriteError::Storage(StorageError::Corrupted(format!(
        "unexpected result {result:?} for {statement}"
    )))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::layer::LayerChain;
    use geovault_storage::InMemoryRowStore;
    use serde_json::json;

    struct Fixture {
        store: InMemoryRowStore,
        config: EngineConfig,
        options: DiffOptions,
        version: i64,
    }

    impl Fixture {
        fn new(history: bool) -> Self {
            Self {
                store: InMemoryRowStore::with_tables(["roads"]),
                config: EngineConfig::new(LayerChain::single("roads")).history(history),
                options: DiffOptions::for_features(META_NAMESPACE),
                version: 0,
            }
        }

        fn write(
            &mut self,
            feature: Feature,
            strategy: &UpdateStrategy,
        ) -> WriteResult<Option<WriteOutcome>> {
            self.version = self.store.next_sequence("roads")?;
            let ctx = WriteContext::new(&self.store, &self.config, &self.options)?;
            let mut writer = FeatureWriter::new(ctx, feature, self.version, "tester", strategy)?;
            loop {
                let write = match writer.run()? {
                    Step::Done(outcome) => return Ok(outcome),
                    Step::Write(write) => write,
                };
                let result = self
                    .store
                    .execute(&write.statement, &[write.params])?
                    .pop()
                    .unwrap();
                match (write.handler)(result) {
                    Completion::Finished(result) => return result,
                    Completion::Retry(next) => writer = *next,
                }
            }
        }
    }

    #[test]
    fn insert_then_update() {
        let mut fx = Fixture::new(true);
        let feature = Feature::new("F1").with_property("b", 2);
        let first = fx.write(feature.clone(), &UpdateStrategy::new()).unwrap().unwrap();
        assert_eq!(first.action, Action::Inserted);
        let second = fx.write(feature, &UpdateStrategy::new()).unwrap().unwrap();
        assert_eq!(second.action, Action::Updated);
        assert_eq!(second.feature.meta.created_at, first.feature.meta.created_at);
        assert_eq!(fx.store.history("roads", "F1").unwrap().len(), 2);
    }

    #[test]
    fn delete_of_tombstone_is_noop() {
        let mut fx = Fixture::new(true);
        fx.write(Feature::new("F1"), &UpdateStrategy::new()).unwrap();
        let deleted = fx
            .write(Feature::tombstone("F1"), &UpdateStrategy::new())
            .unwrap()
            .unwrap();
        assert_eq!(deleted.action, Action::Deleted);

        let again = fx
            .write(
                Feature::tombstone("F1"),
                &UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Error),
            )
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn partial_write_patches_head() {
        let mut fx = Fixture::new(true);
        let full = Feature::new("F1").with_property("a", 1).with_property("b", 2);
        fx.write(full, &UpdateStrategy::new()).unwrap();

        let patch = Feature::new("F1").with_property("b", 3);
        let outcome = fx.write(patch, &UpdateStrategy::partial()).unwrap().unwrap();
        assert_eq!(outcome.feature.properties["a"], json!(1));
        assert_eq!(outcome.feature.properties["b"], json!(3));

        let missing = fx.write(Feature::new("F2"), &UpdateStrategy::partial());
        assert_eq!(missing.unwrap_err().code(), ErrorCode::FeatureNotExists);
    }

    #[test]
    fn stale_base_version_is_merged() {
        let mut fx = Fixture::new(true);
        let base = fx
            .write(Feature::new("F1").with_property("a", 1).with_property("b", 1), &UpdateStrategy::new())
            .unwrap()
            .unwrap();
        fx.write(
            Feature::new("F1").with_property("a", 2).with_property("b", 1),
            &UpdateStrategy::new(),
        )
        .unwrap();

        let incoming = Feature::new("F1")
            .with_property("a", 1)
            .with_property("b", 5)
            .with_base_version(base.version);
        let merged = fx
            .write(incoming, &UpdateStrategy::new().detect_version_conflicts())
            .unwrap()
            .unwrap();
        assert_eq!(merged.action, Action::Updated);
        assert_eq!(merged.feature.properties["a"], json!(2));
        assert_eq!(merged.feature.properties["b"], json!(5));
    }

    #[test]
    fn single_row_conditional_update() {
        let mut fx = Fixture::new(false);
        let first = fx.write(Feature::new("F1"), &UpdateStrategy::new()).unwrap().unwrap();
        let strategy = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Error);

        let ok = fx
            .write(Feature::new("F1").with_base_version(first.version), &strategy)
            .unwrap()
            .unwrap();
        assert_eq!(ok.action, Action::Updated);

        let err = fx
            .write(Feature::new("F1").with_base_version(first.version), &strategy)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VersionConflict);
        assert_eq!(fx.store.row_count("roads").unwrap(), 1);
    }

    #[test]
    fn detection_without_base_version_is_rejected_for_existing_features() {
        let mut fx = Fixture::new(true);
        let strategy = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Error);
        assert!(fx.write(Feature::new("F1"), &strategy).unwrap().is_some());
        let err = fx.write(Feature::new("F1"), &strategy).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IllegalArgument);
    }
}
