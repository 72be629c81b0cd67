//! Integration tests for environment tree lifecycle: creation, labels,
//! extraction, kill/detach semantics, and teardown.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arbor_core::{ServiceProviderMarker, endpoints};
use arbor_runtime::{EnvironmentError, MAX_LABEL_LENGTH};

use common::{FailingJob, Harness, HarnessOptions, nest, wait_for};

#[tokio::test]
async fn test_create_nested_environment_registers_child() {
    let harness = Harness::new();
    let nested = nest(&harness.root, Some("media"));

    assert_eq!(harness.root.child_ids(), vec![nested.handle.id()]);
    assert!(harness.root.diagnostics().get("media").is_some());
}

#[tokio::test]
async fn test_generated_labels_are_sequential_across_the_tree() {
    let harness = Harness::new();
    let first = nest(&harness.root, None);
    let _second = nest(&harness.root, None);

    assert_eq!(
        harness.root.diagnostics().list(),
        vec!["env-1".to_string(), "env-2".to_string()]
    );

    // The counter is tree-wide: a nested branch continues the sequence.
    let controller = harness.root.extract_child(first.handle.id()).unwrap();
    let first_env = Arc::clone(controller.environment());
    let _grandchild = nest(&first_env, None);
    assert_eq!(first_env.diagnostics().list(), vec!["env-3".to_string()]);
}

#[tokio::test]
async fn test_overlong_label_is_truncated() {
    let harness = Harness::new();
    let long_label = "x".repeat(MAX_LABEL_LENGTH.saturating_mul(2));
    let _nested = nest(&harness.root, Some(&long_label));

    let labels = harness.root.diagnostics().list();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].len(), MAX_LABEL_LENGTH);
}

#[tokio::test]
async fn test_extract_child_is_exactly_once() {
    let harness = Harness::new();
    let nested = nest(&harness.root, Some("once"));

    let first = harness.root.extract_child(nested.handle.id());
    assert!(first.is_some());
    let second = harness.root.extract_child(nested.handle.id());
    assert!(second.is_none());
}

#[tokio::test]
async fn test_kill_removes_child_and_invokes_callback() {
    let harness = Harness::new();
    let nested = nest(&harness.root, Some("victim"));
    let id = nested.handle.id();

    let called = Arc::new(AtomicBool::new(false));
    let called_clone = Arc::clone(&called);
    nested.handle.kill(move || {
        called_clone.store(true, Ordering::SeqCst);
    });

    assert!(called.load(Ordering::SeqCst));
    assert!(!harness.root.child_ids().contains(&id));
    assert!(harness.root.extract_child(id).is_none());
    assert!(harness.root.diagnostics().get("victim").is_none());
}

#[tokio::test]
async fn test_controller_connection_loss_destroys_child() {
    let harness = Harness::new();
    let nested = nest(&harness.root, Some("flaky"));
    let id = nested.handle.id();

    let kills_before = harness.kills.load(Ordering::SeqCst);
    drop(nested.controller_client);

    let root = Arc::clone(&harness.root);
    wait_for("child self-destruct", move || {
        !root.child_ids().contains(&id)
    })
    .await;
    wait_for("containment unit killed", || {
        harness.kills.load(Ordering::SeqCst) > kills_before
    })
    .await;
}

#[tokio::test]
async fn test_detach_disarms_self_destruct() {
    let harness = Harness::new();
    let nested = nest(&harness.root, Some("standalone"));
    let id = nested.handle.id();

    nested.handle.detach();
    drop(nested.controller_client);

    // Give the watcher every chance to misfire.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(harness.root.child_ids().contains(&id));
}

#[tokio::test]
async fn test_containment_failure_is_fatal_for_construction() {
    let harness = Harness::new();
    let platform = arbor_runtime::Platform {
        connector: Arc::new(common::StubConnector::new(
            Arc::clone(&harness.loader),
            Arc::clone(&harness.runner),
        )),
        archive_reader: Arc::clone(&harness.archive_reader) as _,
        spawner: Arc::clone(&harness.spawner) as _,
        sandbox_resolver: Arc::clone(&harness.resolver) as _,
        legacy_defaults: Vec::new(),
    };

    let result = arbor_runtime::Environment::new_root(
        "doomed",
        &FailingJob,
        Arc::new(common::StubProvider::new()),
        platform,
        None,
    );
    assert!(matches!(result, Err(EnvironmentError::Containment(_))));
}

#[tokio::test]
async fn test_root_teardown_kills_containment_units() {
    let harness = Harness::new();
    let _nested = nest(&harness.root, Some("leaf"));
    let kills = Arc::clone(&harness.kills);

    let kills_before = kills.load(Ordering::SeqCst);
    drop(harness.root);
    // Root teardown kills the root's own unit; descendants die at the
    // containment level, and their in-memory state unwinds by ownership.
    wait_for("teardown kills", move || {
        kills.load(Ordering::SeqCst) > kills_before
    })
    .await;
}

#[tokio::test]
async fn test_first_nested_environment_receives_startup_services() {
    let (services_client, services_server) = endpoints::<ServiceProviderMarker>();
    let harness = Harness::with_options(HarnessOptions {
        first_nested_services: Some(services_server),
        ..HarnessOptions::default()
    });

    let first = nest(&harness.root, Some("sys"));
    let _second = nest(&harness.root, Some("app"));
    assert!(!services_client.is_closed());

    // The binding lives in the first child's scope: killing that child
    // releases it; the second child never held it.
    first.handle.kill(|| {});
    wait_for("startup services released", || services_client.is_closed()).await;
}
