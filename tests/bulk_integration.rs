//! Integration tests for dependency-ordered bulk execution.
//!
//! Covers scheduling guarantees (order, cycle tolerance) and the upsert
//! fallback policy through the public API against the mock backend.

use std::sync::Arc;

use stagehand::backend::mock::{MockBackend, MockOp};
use stagehand::backend::BackendError;
use stagehand::core::types::{ObjectHandle, ObjectKind, ObjectName};
use stagehand::engine::{ApplyMode, BulkError, BulkExecutor, BulkResult, Context, Manifest};

fn handle(kind: ObjectKind, name: &str) -> ObjectHandle {
    ObjectHandle::new(kind, ObjectName::new(name).unwrap())
}

fn ctx() -> Context {
    Context::default()
}

// =============================================================================
// Scheduling
// =============================================================================

/// A package and a class that depends on it execute package-first, no
/// matter how the manifest lists them.
#[tokio::test]
async fn dependency_order_is_independent_of_manifest_order() {
    for raw in [
        r#"{"schema":"flat","objects":[
            {"id":"pkg","type":"package","name":"z_demo"},
            {"id":"cls","type":"class","name":"zcl_demo","dependsOn":["pkg"]}]}"#,
        r#"{"schema":"flat","objects":[
            {"id":"cls","type":"class","name":"zcl_demo","dependsOn":["pkg"]},
            {"id":"pkg","type":"package","name":"z_demo"}]}"#,
    ] {
        let backend = Arc::new(MockBackend::new());
        let manifest = Manifest::from_json(raw).unwrap();
        let executor = BulkExecutor::new(backend, ApplyMode::Upsert, false);

        let result = executor.run(&manifest, &ctx()).await;
        assert!(result.is_success());
        assert_eq!(result.report().order, vec!["pkg", "cls"]);
    }
}

/// Two objects in a mutual cycle are each executed exactly once, ordered
/// by kind priority then id.
#[tokio::test]
async fn mutual_cycle_executes_each_object_once() {
    let backend = Arc::new(MockBackend::new());
    let manifest = Manifest::from_json(
        r#"{"schema":"flat","objects":[
            {"id":"cls","type":"class","name":"zcl_a","dependsOn":["tbl"]},
            {"id":"tbl","type":"table","name":"z_orders","dependsOn":["cls"]}]}"#,
    )
    .unwrap();
    let executor = BulkExecutor::new(backend.clone(), ApplyMode::Create, false);

    let result = executor.run(&manifest, &ctx()).await;
    assert!(result.is_success());
    // Table kind sorts before class kind.
    assert_eq!(result.report().order, vec!["tbl", "cls"]);
    assert_eq!(result.report().applied.len(), 2);

    let creates = backend
        .calls()
        .iter()
        .filter(|c| matches!(c.op, MockOp::Create))
        .count();
    assert_eq!(creates, 2, "each cyclic object created exactly once");
}

// =============================================================================
// Upsert fallback
// =============================================================================

/// Any create failure triggers exactly one update attempt.
#[tokio::test]
async fn upsert_falls_back_once_per_failed_create() {
    let backend = Arc::new(MockBackend::new());
    backend.seed_object(&handle(ObjectKind::Class, "zcl_demo"), "old source");

    let manifest = Manifest::from_json(
        r#"{"schema":"flat","objects":[
            {"id":"cls","type":"class","name":"zcl_demo",
             "config":{"package":"z_demo"},
             "source":"new source"}]}"#,
    )
    .unwrap();
    let executor = BulkExecutor::new(backend.clone(), ApplyMode::Upsert, true);

    let result = executor.run(&manifest, &ctx()).await;
    assert!(result.is_success());
    assert_eq!(
        backend
            .active_source(&handle(ObjectKind::Class, "zcl_demo"))
            .as_deref(),
        Some("new source")
    );
}

/// When both attempts fail, the batch halts at that object and the error
/// carries both failures.
#[tokio::test]
async fn upsert_double_failure_halts_with_both_errors() {
    let backend = Arc::new(MockBackend::new());
    backend.seed_object(&handle(ObjectKind::Class, "zcl_demo"), "old source");
    backend.fail_always(
        MockOp::Lock,
        BackendError::LockConflict("held by another user".into()),
    );

    let manifest = Manifest::from_json(
        r#"{"schema":"flat","objects":[
            {"id":"pkg","type":"package","name":"z_demo"},
            {"id":"cls","type":"class","name":"zcl_demo",
             "source":"new source","dependsOn":["pkg"]},
            {"id":"never","type":"class","name":"zcl_never",
             "dependsOn":["cls"]}]}"#,
    )
    .unwrap();
    let executor = BulkExecutor::new(backend.clone(), ApplyMode::Upsert, false);

    let BulkResult::Aborted { error, report } = executor.run(&manifest, &ctx()).await else {
        panic!("expected abort at cls");
    };
    let BulkError::UpsertFailed { id, create, update } = error else {
        panic!("expected both errors attributed to the record");
    };
    assert_eq!(id, "cls");
    assert!(!create.to_string().is_empty());
    assert!(!update.to_string().is_empty());

    // The package before the failure stayed applied; the record after it
    // never ran.
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].id, "pkg");
    assert!(!backend.has_object(&handle(ObjectKind::Class, "zcl_never")));
}

// =============================================================================
// Tree manifests end to end
// =============================================================================

#[tokio::test]
async fn tree_manifest_applies_children_after_parent() {
    let backend = Arc::new(MockBackend::new());
    // Payload is base64 of "class zcl_demo."
    let manifest = Manifest::from_json(
        r#"{"schema":"tree","root":{
            "id":"pkg","type":"package","name":"z_demo",
            "children":[
                {"id":"cls","type":"class","name":"zcl_demo",
                 "payload":"Y2xhc3MgemNsX2RlbW8u"}]}}"#,
    )
    .unwrap();
    let executor = BulkExecutor::new(backend.clone(), ApplyMode::Create, true);

    let result = executor.run(&manifest, &ctx()).await;
    assert!(result.is_success());
    assert_eq!(result.report().order, vec!["pkg", "cls"]);
    assert_eq!(
        backend
            .active_source(&handle(ObjectKind::Class, "zcl_demo"))
            .as_deref(),
        Some("class zcl_demo.")
    );
}
