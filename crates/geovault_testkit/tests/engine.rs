//! Integration tests for the write engine over the in-memory row store.

use geovault_core::{
    Action, EngineConfig, ErrorCode, ErrorPolicy, ExecutionMode, ExistsPolicy, Feature,
    FeatureModification, LayerChain, MergeConflictPolicy, NotExistsPolicy, SpaceContext,
    UpdateStrategy, VersionConflictPolicy, WriteError, META_NAMESPACE,
};
use geovault_storage::Operation;
use geovault_testkit::prelude::*;
use serde_json::json;
use std::thread;

fn error_strategy() -> UpdateStrategy {
    UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Error)
}

/// Writes `F1` until its HEAD is at `version`.
fn head_at(space: &TestSpace, version: i64) {
    for n in 1..=version {
        space.put(Feature::new("F1").with_property("n", n));
    }
    assert_eq!(space.read_feature("F1").unwrap().unwrap().version(), Some(version));
}

#[test]
fn insert_then_update_reports_actions() {
    init_tracing();
    let space = TestSpace::single();
    let feature = Feature::new("F1").with_property("b", 2);

    let first = space
        .write_features(vec![feature.clone()], None, &UpdateStrategy::new(), &[], None)
        .unwrap();
    assert_eq!(first.inserted, vec!["F1".to_string()]);
    assert!(first.updated.is_empty());
    assert!(first.deleted.is_empty());

    let second = space
        .write_features(vec![feature], None, &UpdateStrategy::new(), &[], None)
        .unwrap();
    assert!(second.inserted.is_empty());
    assert_eq!(second.updated, vec!["F1".to_string()]);
    assert!(second.deleted.is_empty());
    assert_eq!(second.features[0].properties["b"], json!(2));
}

#[test]
fn deleting_a_tombstone_is_a_noop() {
    let space = TestSpace::single();
    let created = space.put(Feature::new("F1").with_property("lanes", 2));
    let deleted = space
        .write_feature(
            Feature::tombstone("F1").with_base_version(created.version),
            None,
            &error_strategy(),
            &[],
        )
        .unwrap()
        .unwrap();
    assert_eq!(deleted.action, Action::Deleted);

    // Current and stale base versions alike.
    for base in [deleted.version, created.version] {
        let again = space
            .write_feature(
                Feature::tombstone("F1").with_base_version(base),
                None,
                &error_strategy(),
                &[],
            )
            .unwrap();
        assert!(again.is_none());
    }
    assert_eq!(space.history("F1").unwrap().len(), 2);
    check_version_ranges(space.store().as_ref(), ROADS, "F1");
}

#[test]
fn racing_writers_sequentially() {
    let space = TestSpace::single();
    head_at(&space, 5);

    let first = Feature::new("F1").with_property("n", 10).with_base_version(5);
    let second = Feature::new("F1").with_property("n", 20).with_base_version(5);

    let winner = space
        .write_feature(first, Some("alice"), &error_strategy(), &[])
        .unwrap()
        .unwrap();
    assert_eq!(winner.action, Action::Updated);

    let err = space
        .write_feature(second, Some("bob"), &error_strategy(), &[])
        .unwrap_err();
    match &err {
        WriteError::VersionConflict {
            id,
            operation,
            base_version,
            head_version,
        } => {
            assert_eq!(id, "F1");
            assert_eq!(*operation, Operation::Update);
            assert_eq!(*base_version, Some(5));
            assert_eq!(*head_version, Some(winner.version));
        }
        other => panic!("expected a version conflict, got {other}"),
    }
    assert!(err.is_retryable());
    assert!(err.to_string().contains("base version 5"));
}

#[test]
fn racing_writers_on_threads() {
    let space = TestSpace::single();
    head_at(&space, 5);

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|n| {
                let space = &space;
                scope.spawn(move || {
                    let change = Feature::new("F1").with_property("n", n).with_base_version(5);
                    space.write_feature(change, None, &error_strategy(), &[])
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let (ok, err): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    assert_eq!(ok.len(), 1);
    assert_eq!(err.len(), 1);
    let err = err.into_iter().next().unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::VersionConflict);
    assert!(matches!(
        err,
        WriteError::VersionConflict {
            base_version: Some(5),
            ..
        }
    ));
    check_version_ranges(space.store().as_ref(), ROADS, "F1");
}

#[test]
fn concurrent_disjoint_changes_are_merged() {
    let space = TestSpace::single();
    let base = space.put(Feature::new("F1").with_property("a", 1).with_property("b", 1));
    let merge = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Merge);

    let head = Feature::new("F1")
        .with_property("a", 2)
        .with_property("b", 1)
        .with_base_version(base.version);
    space.write_feature(head, None, &merge, &[]).unwrap();

    let incoming = Feature::new("F1")
        .with_property("a", 1)
        .with_property("b", 3)
        .with_base_version(base.version);
    let merged = space.write_feature(incoming, None, &merge, &[]).unwrap().unwrap();
    assert_eq!(merged.action, Action::Updated);
    assert!(!merged.feature.is_conflicting());

    let current = space.read_feature("F1").unwrap().unwrap();
    assert_eq!(current.properties["a"], json!(2));
    assert_eq!(current.properties["b"], json!(3));
}

#[test]
fn merge_conflicts_are_reported() {
    let space = TestSpace::single();
    let base = space.put(Feature::new("F1").with_property("a", 1));
    space.put(Feature::new("F1").with_property("a", 2));

    let strategy = UpdateStrategy::new()
        .on_version_conflict(VersionConflictPolicy::Merge)
        .on_merge_conflict(MergeConflictPolicy::Error);
    let incoming = Feature::new("F1").with_property("a", 3).with_base_version(base.version);
    let err = space.write_feature(incoming, None, &strategy, &[]).unwrap_err();

    let WriteError::MergeConflict { id, conflicts, .. } = &err else {
        panic!("expected a merge conflict, got {err}");
    };
    assert_eq!(id, "F1");
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path, "properties.a");
    assert_eq!(conflicts[0].ours, json!(3));
    assert_eq!(conflicts[0].theirs, json!(2));
    assert_eq!(err.code().as_str(), "MERGE_CONFLICT");
    assert!(!err.hint().is_empty());
}

#[test]
fn merge_conflicts_can_be_written_through() {
    let space = TestSpace::single();
    let base = space.put(Feature::new("F1").with_property("a", 1));
    space.put(Feature::new("F1").with_property("a", 2));

    let strategy = UpdateStrategy::new()
        .on_version_conflict(VersionConflictPolicy::Merge)
        .on_merge_conflict(MergeConflictPolicy::Continue);
    let incoming = Feature::new("F1").with_property("a", 3).with_base_version(base.version);
    let collection = space
        .write_features(vec![incoming], None, &strategy, &[], None)
        .unwrap();

    assert_eq!(collection.conflicting, vec!["F1".to_string()]);
    assert_eq!(collection.updated, vec!["F1".to_string()]);
    let current = space.read_feature("F1").unwrap().unwrap();
    assert!(current.is_conflicting());
    assert_eq!(current.properties["a"], json!(3));
}

#[test]
fn existence_policies() {
    let absent = TestSpace::single();
    let present = TestSpace::single();
    present.put(Feature::new("F1").with_property("n", 1));
    let change = || Feature::new("F1").with_property("n", 2);

    // Existing features.
    let retain = UpdateStrategy::new().on_exists(ExistsPolicy::Retain);
    assert!(present.write_feature(change(), None, &retain, &[]).unwrap().is_none());
    assert_eq!(present.read_feature("F1").unwrap().unwrap().properties["n"], json!(1));

    let error = UpdateStrategy::new().on_exists(ExistsPolicy::Error);
    let err = present.write_feature(change(), None, &error, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FeatureExists);
    assert_eq!(err.feature_id(), Some("F1"));

    let delete = UpdateStrategy::new().on_exists(ExistsPolicy::Delete);
    let outcome = present.write_feature(change(), None, &delete, &[]).unwrap().unwrap();
    assert_eq!(outcome.action, Action::Deleted);
    assert!(present.read_feature("F1").unwrap().is_none());

    // Absent features.
    let retain = UpdateStrategy::new().on_not_exists(NotExistsPolicy::Retain);
    assert!(absent.write_feature(change(), None, &retain, &[]).unwrap().is_none());
    assert!(absent.read_feature("F1").unwrap().is_none());

    let error = UpdateStrategy::new().on_not_exists(NotExistsPolicy::Error);
    let err = absent.write_feature(change(), None, &error, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FeatureNotExists);

    // Existence policies do not apply to the other case.
    for strategy in [
        UpdateStrategy::new().on_exists(ExistsPolicy::Retain),
        UpdateStrategy::new().on_exists(ExistsPolicy::Error),
        UpdateStrategy::new().on_exists(ExistsPolicy::Delete),
    ] {
        let space = TestSpace::single();
        let outcome = space.write_feature(change(), None, &strategy, &[]).unwrap().unwrap();
        assert_eq!(outcome.action, Action::Inserted);
    }
    for strategy in [
        UpdateStrategy::new().on_not_exists(NotExistsPolicy::Retain),
        UpdateStrategy::new().on_not_exists(NotExistsPolicy::Error),
    ] {
        let space = TestSpace::single();
        space.put(Feature::new("F1").with_property("n", 1));
        let outcome = space.write_feature(change(), None, &strategy, &[]).unwrap().unwrap();
        assert_eq!(outcome.action, Action::Updated);
    }
}

#[test]
fn partial_writes_require_the_feature() {
    let space = TestSpace::single();
    let err = space
        .write_feature(Feature::new("F1").with_property("a", 1), None, &UpdateStrategy::partial(), &[])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::FeatureNotExists);

    let strategy = UpdateStrategy::partial().on_not_exists(NotExistsPolicy::Create);
    let err = space
        .write_feature(Feature::new("F1"), None, &strategy, &[])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalArgument);
}

#[test]
fn created_at_survives_updates() {
    let space = TestSpace::single();
    let created = space.put(Feature::new("F1").with_property("n", 1));
    let created_at = created.feature.meta.created_at;
    assert!(created_at.is_some());

    thread::sleep(std::time::Duration::from_millis(2));
    let updated = space.put(Feature::new("F1").with_property("n", 2));
    assert_eq!(updated.feature.meta.created_at, created_at);
    assert_eq!(
        space.read_feature("F1").unwrap().unwrap().meta.created_at,
        created_at
    );
    assert!(updated.feature.meta.updated_at >= created_at);
}

#[test]
fn authors_default_to_the_configured_one() {
    let space = TestSpace::single();
    let anonymous = space.put(Feature::new("F1"));
    assert_eq!(anonymous.author, "ANONYMOUS");

    let named = space
        .write_feature(Feature::new("F2"), Some("alice"), &UpdateStrategy::new(), &[])
        .unwrap()
        .unwrap();
    assert_eq!(named.author, "alice");
    assert_eq!(space.history("F2").unwrap()[0].author, "alice");
}

#[test]
fn extension_deletes_hide_base_features() {
    let space = scenarios::extended_space(SpaceContext::Default);

    let deleted = space
        .write_feature(Feature::tombstone("road-0"), None, &UpdateStrategy::new(), &[])
        .unwrap()
        .unwrap();
    assert_eq!(deleted.action, Action::Deleted);
    assert!(space.read_feature("road-0").unwrap().is_none());

    let rows = space.history("road-0").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].operation, Operation::HistoryDelete);
    assert_eq!(space.memory.row_count(ROADS_BASE).unwrap(), 1);

    let restored = space.put(scenarios::road("road-0", "Main St", 4));
    assert_eq!(restored.action, Action::Updated);
    let rows = space.history("road-0").unwrap();
    assert_eq!(rows.last().unwrap().operation, Operation::Join);
    check_version_ranges(space.store().as_ref(), ROADS_EXTENSION, "road-0");
}

#[test]
fn extension_writes_of_base_features_are_joins() {
    let space = scenarios::extended_space(SpaceContext::Default);
    let outcome = space.put(scenarios::road("road-0", "Main St", 3));
    assert_eq!(outcome.action, Action::Updated);
    assert_eq!(space.history("road-0").unwrap()[0].operation, Operation::Join);

    let inserted = space.put(scenarios::road("road-1", "Side St", 1));
    assert_eq!(inserted.action, Action::Inserted);
    assert_eq!(space.history("road-1").unwrap()[0].operation, Operation::Insert);
}

#[test]
fn super_context_writes_the_base_layer() {
    let space = TestSpace::composite(SpaceContext::Super);
    space.put(scenarios::road("road-0", "Main St", 2));
    assert_eq!(space.memory.row_count(ROADS_BASE).unwrap(), 1);
    assert_eq!(space.memory.row_count(ROADS_EXTENSION).unwrap(), 0);
}

#[test]
fn single_row_mode_keeps_one_row() {
    let space = TestSpace::without_history();
    let created = space.put(Feature::new("F1").with_property("n", 1));
    assert_eq!(created.action, Action::Inserted);
    let updated = space.put(Feature::new("F1").with_property("n", 2));
    assert_eq!(updated.action, Action::Updated);
    assert_eq!(space.memory.row_count(ROADS).unwrap(), 1);

    let stale = Feature::new("F1").with_property("n", 3).with_base_version(created.version);
    let err = space.write_feature(stale, None, &error_strategy(), &[]).unwrap_err();
    assert!(matches!(
        err,
        WriteError::VersionConflict {
            base_version: Some(b),
            head_version: Some(h),
            ..
        } if b == created.version && h == updated.version
    ));

    let deleted = space
        .write_feature(Feature::tombstone("F1"), None, &UpdateStrategy::new(), &[])
        .unwrap()
        .unwrap();
    assert_eq!(deleted.action, Action::Deleted);
    assert_eq!(space.memory.row_count(ROADS).unwrap(), 0);
    assert!(space
        .write_feature(Feature::tombstone("F1"), None, &UpdateStrategy::new(), &[])
        .unwrap()
        .is_none());
}

#[test]
fn merge_requires_history() {
    let space = TestSpace::without_history();
    space.put(Feature::new("F1"));
    let strategy = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Merge);
    let err = space
        .write_feature(Feature::new("F1").with_base_version(1), None, &strategy, &[])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalArgument);
}

#[test]
fn continue_policy_collects_failures() {
    let config = EngineConfig::new(LayerChain::single(ROADS)).error_policy(ErrorPolicy::Continue);
    let space = TestSpace::with_config(config);
    space.put(Feature::new("F1"));

    let strategy = UpdateStrategy::new().on_exists(ExistsPolicy::Error);
    let collection = space
        .write_features(
            vec![Feature::new("F0"), Feature::new("F1"), Feature::new("F2")],
            None,
            &strategy,
            &[],
            None,
        )
        .unwrap();

    assert_eq!(collection.inserted, vec!["F0".to_string(), "F2".to_string()]);
    assert_eq!(collection.failed.len(), 1);
    assert_eq!(collection.failed[0].index, 1);
    assert_eq!(collection.failed[0].id.as_deref(), Some("F1"));
    assert_eq!(collection.failed[0].error.code(), ErrorCode::FeatureExists);
}

#[test]
fn modifications_share_one_version() {
    let config = EngineConfig::new(LayerChain::single(ROADS)).execution(ExecutionMode::Deferred);
    let space = TestSpace::with_config(config);
    space.put(Feature::new("old"));

    let collection = space
        .write_feature_modifications(
            vec![
                FeatureModification::write(
                    vec![scenarios::road("a", "A St", 1), scenarios::road("b", "B St", 2)],
                    UpdateStrategy::new(),
                ),
                FeatureModification::delete(vec!["old".to_string()], UpdateStrategy::new()),
            ],
            Some("editor"),
            None,
        )
        .unwrap();

    assert_eq!(collection.inserted, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(collection.deleted, vec!["old".to_string()]);
    let versions: Vec<_> = collection.features.iter().map(Feature::version).collect();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0], versions[1]);
}

#[test]
fn version_conflict_policies_replace_and_retain() {
    let space = TestSpace::single();
    let base = space.put(Feature::new("F1").with_property("a", 1));
    space.put(Feature::new("F1").with_property("a", 2));
    let stale = || Feature::new("F1").with_property("a", 3).with_base_version(base.version);

    let retain = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Retain);
    assert!(space.write_feature(stale(), None, &retain, &[]).unwrap().is_none());
    assert_eq!(space.read_feature("F1").unwrap().unwrap().properties["a"], json!(2));

    let replace = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Replace);
    let outcome = space.write_feature(stale(), None, &replace, &[]).unwrap().unwrap();
    assert_eq!(outcome.action, Action::Updated);
    assert_eq!(space.read_feature("F1").unwrap().unwrap().properties["a"], json!(3));
    assert_eq!(space.history("F1").unwrap().len(), 3);
    check_version_ranges(space.store().as_ref(), ROADS, "F1");
}

#[test]
fn merge_conflict_policies_replace_and_retain() {
    let space = TestSpace::single();
    let base = space.put(Feature::new("F1").with_property("a", 1));
    space.put(Feature::new("F1").with_property("a", 2));
    let incoming = || Feature::new("F1").with_property("a", 3).with_base_version(base.version);
    let merge = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Merge);

    let retain = merge.on_merge_conflict(MergeConflictPolicy::Retain);
    assert!(space.write_feature(incoming(), None, &retain, &[]).unwrap().is_none());
    assert_eq!(space.read_feature("F1").unwrap().unwrap().properties["a"], json!(2));

    let replace = merge.on_merge_conflict(MergeConflictPolicy::Replace);
    let outcome = space.write_feature(incoming(), None, &replace, &[]).unwrap().unwrap();
    assert!(!outcome.feature.is_conflicting());
    let current = space.read_feature("F1").unwrap().unwrap();
    assert_eq!(current.properties["a"], json!(3));
    assert!(!current.is_conflicting());
}

#[test]
fn stale_delete_under_merge_is_a_merge_conflict() {
    let space = TestSpace::single();
    let base = space.put(Feature::new("F1").with_property("a", 1));
    space.put(Feature::new("F1").with_property("a", 2));

    let strategy = UpdateStrategy::new()
        .on_version_conflict(VersionConflictPolicy::Merge)
        .on_merge_conflict(MergeConflictPolicy::Error);
    let err = space
        .write_feature(
            Feature::tombstone("F1").with_base_version(base.version),
            None,
            &strategy,
            &[],
        )
        .unwrap_err();

    let WriteError::MergeConflict {
        operation,
        conflicts,
        ..
    } = &err
    else {
        panic!("expected a merge conflict, got {err}");
    };
    assert_eq!(*operation, Operation::Delete);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path, format!("properties.{META_NAMESPACE}.deleted"));
    assert_eq!(conflicts[0].ours, json!(true));
    assert_eq!(conflicts[0].theirs, json!(false));
    assert!(space.read_feature("F1").unwrap().is_some());
}

#[test]
fn default_deletes_of_missing_features_are_noops() {
    let space = scenarios::extended_space(SpaceContext::Default);
    let strict = UpdateStrategy::new().on_not_exists(NotExistsPolicy::Error);

    let missing = space
        .write_feature(Feature::tombstone("NOPE"), None, &strict, &[])
        .unwrap();
    assert!(missing.is_none());
    assert_eq!(space.memory.row_count(ROADS_EXTENSION).unwrap(), 0);

    space
        .write_feature(Feature::tombstone("road-0"), None, &UpdateStrategy::new(), &[])
        .unwrap()
        .unwrap();
    let again = space
        .write_feature(Feature::tombstone("road-0"), None, &strict, &[])
        .unwrap();
    assert!(again.is_none());
    assert_eq!(space.memory.row_count(ROADS_EXTENSION).unwrap(), 1);

    // Extension deletes keep the policy.
    let extension = TestSpace::composite(SpaceContext::Extension);
    let err = extension
        .write_feature(Feature::tombstone("NOPE"), None, &strict, &[])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::FeatureNotExists);
}

#[test]
fn stale_base_layer_versions_conflict_with_history() {
    let space = TestSpace::composite(SpaceContext::Default);
    let base = space
        .put_in(SpaceContext::Super, scenarios::road("road-0", "Main St", 2))
        .unwrap();
    let head = space
        .put_in(SpaceContext::Super, scenarios::road("road-0", "Main St", 3))
        .unwrap();
    let change = || scenarios::road("road-0", "Broadway", 2).with_base_version(base.version);

    let err = space.write_feature(change(), None, &error_strategy(), &[]).unwrap_err();
    assert!(matches!(
        err,
        WriteError::VersionConflict {
            base_version: Some(b),
            head_version: Some(h),
            ..
        } if b == base.version && h == head.version
    ));
    assert_eq!(space.memory.row_count(ROADS_EXTENSION).unwrap(), 0);

    let merge = UpdateStrategy::new().on_version_conflict(VersionConflictPolicy::Merge);
    let merged = space.write_feature(change(), None, &merge, &[]).unwrap().unwrap();
    assert_eq!(merged.action, Action::Updated);
    let current = space.read_feature("road-0").unwrap().unwrap();
    assert_eq!(current.properties["name"], json!("Broadway"));
    assert_eq!(current.properties["lanes"], json!(3));
    assert_eq!(space.history("road-0").unwrap()[0].operation, Operation::Join);
}

#[test]
fn stale_base_layer_versions_conflict_without_history() {
    let space = TestSpace::composite_without_history(SpaceContext::Default);
    let base = space
        .put_in(SpaceContext::Super, scenarios::road("road-0", "Main St", 2))
        .unwrap();
    let head = space
        .put_in(SpaceContext::Super, scenarios::road("road-0", "Main St", 3))
        .unwrap();

    let stale = scenarios::road("road-0", "Broadway", 2).with_base_version(base.version);
    let err = space.write_feature(stale, None, &error_strategy(), &[]).unwrap_err();
    assert!(matches!(
        err,
        WriteError::VersionConflict {
            head_version: Some(h),
            ..
        } if h == head.version
    ));
    assert_eq!(space.memory.row_count(ROADS_EXTENSION).unwrap(), 0);

    let fresh = scenarios::road("road-0", "Broadway", 3).with_base_version(head.version);
    let outcome = space.write_feature(fresh, None, &error_strategy(), &[]).unwrap().unwrap();
    assert_eq!(outcome.action, Action::Updated);
    assert_eq!(space.history("road-0").unwrap()[0].operation, Operation::Join);
}

#[test]
fn recreating_over_a_tombstone_ignores_exists_policies() {
    for on_exists in [ExistsPolicy::Retain, ExistsPolicy::Error] {
        let space = TestSpace::composite_without_history(SpaceContext::Default);
        space.put_in(SpaceContext::Super, scenarios::road("road-0", "Main St", 2));

        let deleted = space
            .write_feature(Feature::tombstone("road-0"), None, &UpdateStrategy::new(), &[])
            .unwrap()
            .unwrap();
        assert_eq!(deleted.action, Action::Deleted);
        assert!(space.read_feature("road-0").unwrap().is_none());

        let strategy = UpdateStrategy::new().on_exists(on_exists);
        let restored = space
            .write_feature(scenarios::road("road-0", "Main St", 4), None, &strategy, &[])
            .unwrap()
            .unwrap();
        assert_eq!(restored.action, Action::Updated);

        let current = space.read_feature("road-0").unwrap().unwrap();
        assert_eq!(current.properties["lanes"], json!(4));
        let rows = space.history("road-0").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].operation, Operation::Join);
    }
}

#[test]
fn composite_writes_without_history_keep_one_row() {
    let space = TestSpace::composite_without_history(SpaceContext::Default);
    let inserted = space.put(scenarios::road("road-1", "Side St", 1));
    assert_eq!(inserted.action, Action::Inserted);
    let updated = space.put(scenarios::road("road-1", "Side St", 2));
    assert_eq!(updated.action, Action::Updated);
    assert_eq!(space.memory.row_count(ROADS_EXTENSION).unwrap(), 1);
    assert_eq!(space.memory.row_count(ROADS_BASE).unwrap(), 0);

    let deleted = space
        .write_feature(Feature::tombstone("road-1"), None, &UpdateStrategy::new(), &[])
        .unwrap()
        .unwrap();
    assert_eq!(deleted.action, Action::Deleted);
    assert_eq!(space.memory.row_count(ROADS_EXTENSION).unwrap(), 0);
}
