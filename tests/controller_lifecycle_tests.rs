//! # Controller Lifecycle Tests
//!
//! Start/stop/wait semantics of `SyncController` and the watch supervisor,
//! running real workers against the in-memory store.

mod common;

use common::{config_map, eventually, fast_policy, init_tracing, namespace, secret, SOURCE};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use nsync_controller::controller::types::{ObjectKind, WatchEvent};
use nsync_controller::controller::{ControllerError, ControllerSettings, SyncController};
use nsync_controller::store::{MemoryStore, ObjectStore, StoreError, StoreOp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn controller(store: &Arc<MemoryStore>, max_retries: u32) -> SyncController<MemoryStore> {
    init_tracing();
    let mut settings = ControllerSettings::new(SOURCE, Duration::from_secs(300));
    settings.watch = fast_policy(max_retries);
    SyncController::new(Arc::clone(store), settings)
}

fn watch_calls(store: &MemoryStore, kind: ObjectKind) -> usize {
    store
        .calls()
        .iter()
        .filter(|call| call.op == StoreOp::Watch && call.kind == kind)
        .count()
}

async fn all_watching(store: &MemoryStore) {
    eventually("every worker subscribed", || {
        ObjectKind::ALL
            .iter()
            .all(|kind| store.watcher_count(*kind) == 1)
    })
    .await;
}

async fn wait_with_timeout(
    controller: &mut SyncController<MemoryStore>,
) -> Result<(), ControllerError> {
    tokio::time::timeout(Duration::from_secs(5), controller.wait())
        .await
        .expect("workers drained in time")
}

#[tokio::test]
async fn test_stop_and_wait_before_start_fail() {
    let store = Arc::new(MemoryStore::new());
    let mut controller = controller(&store, 3);

    assert!(matches!(controller.stop(), Err(ControllerError::NotStarted)));
    assert!(matches!(controller.wait().await, Err(ControllerError::NotStarted)));
    assert!(!controller.is_ready());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let store = Arc::new(MemoryStore::new());
    let mut controller = controller(&store, 3);

    controller.start().expect("first start");
    assert!(matches!(controller.start(), Err(ControllerError::AlreadyStarted)));

    controller.stop().expect("stop");
    wait_with_timeout(&mut controller).await.expect("clean shutdown");
}

#[tokio::test]
async fn test_start_stop_wait_is_clean() {
    let store = Arc::new(MemoryStore::new());
    let ready = Arc::new(AtomicBool::new(false));
    let mut controller = controller(&store, 3).with_readiness(Arc::clone(&ready));

    controller.start().expect("start");
    assert!(ready.load(Ordering::Relaxed));
    all_watching(&store).await;

    controller.stop_handle().stop();
    assert!(!ready.load(Ordering::Relaxed));
    wait_with_timeout(&mut controller).await.expect("clean shutdown");

    // a second stop is harmless
    controller.stop().expect("stop after drain");
}

#[tokio::test]
async fn test_watch_events_drive_replication() {
    let store = Arc::new(MemoryStore::new());
    let mut controller = controller(&store, 3);
    controller.start().expect("start");
    all_watching(&store).await;

    store
        .create("", &namespace("team-a", Some("true")))
        .await
        .expect("create namespace");
    eventually("namespace registered", || {
        controller
            .context()
            .registry
            .is_managed(ObjectKind::Namespace, "team-a")
    })
    .await;

    store
        .create(SOURCE, &secret("db-creds", Some("true")))
        .await
        .expect("create source secret");
    store
        .create(SOURCE, &config_map("app-config", Some("true")))
        .await
        .expect("create source config map");
    eventually("secret replicated", || {
        store.get::<Secret>("team-a", "db-creds").is_some()
    })
    .await;
    eventually("config map replicated", || {
        store.get::<ConfigMap>("team-a", "app-config").is_some()
    })
    .await;

    store
        .update(SOURCE, &secret("db-creds", Some("false")))
        .await
        .expect("opt source out");
    eventually("secret replica removed", || {
        store.get::<Secret>("team-a", "db-creds").is_none()
    })
    .await;
    assert!(store.get::<ConfigMap>("team-a", "app-config").is_some());

    controller.stop().expect("stop");
    wait_with_timeout(&mut controller).await.expect("clean shutdown");
}

#[tokio::test]
async fn test_watch_exhaustion_is_fatal() {
    let store = Arc::new(MemoryStore::new());
    let mut controller = controller(&store, 2);
    controller.start().expect("start");
    all_watching(&store).await;

    for _ in 0..3 {
        store.push_watch_error(ObjectKind::Secret, "connection reset by peer");
    }

    match wait_with_timeout(&mut controller).await {
        Err(ControllerError::WatchExhausted {
            kind,
            failures,
            last_error,
        }) => {
            assert_eq!(kind, ObjectKind::Secret);
            assert_eq!(failures, 3);
            assert!(last_error.contains("connection reset by peer"));
        }
        other => panic!("expected watch exhaustion, got {other:?}"),
    }
    assert!(!controller.is_ready());
}

#[tokio::test]
async fn test_delivered_events_reset_failure_count() {
    let store = Arc::new(MemoryStore::new());
    store.seed(namespace("team-a", Some("true")));
    let mut controller = controller(&store, 1);
    controller.start().expect("start");
    all_watching(&store).await;

    for name in ["unmanaged-1", "unmanaged-2"] {
        store.push_watch_error(ObjectKind::Secret, "410 Gone");
        store
            .push_event(WatchEvent::Added(secret(name, None)))
            .expect("push event");
    }
    store.push_watch_error(ObjectKind::Secret, "429 TooManyRequests");
    store
        .push_event(WatchEvent::Added(secret("db-creds", Some("true"))))
        .expect("push event");

    eventually("last event processed", || {
        store.get::<Secret>("team-a", "db-creds").is_some()
    })
    .await;

    controller.stop().expect("stop");
    wait_with_timeout(&mut controller).await.expect("no exhaustion");
}

#[tokio::test]
async fn test_ended_stream_is_reopened() {
    let store = Arc::new(MemoryStore::new());
    let mut controller = controller(&store, 3);
    controller.start().expect("start");
    all_watching(&store).await;

    store.close_watches(ObjectKind::ConfigMap);
    eventually("config map watch reopened", || {
        watch_calls(&store, ObjectKind::ConfigMap) == 2
            && store.watcher_count(ObjectKind::ConfigMap) == 1
    })
    .await;

    controller.stop().expect("stop");
    wait_with_timeout(&mut controller).await.expect("clean shutdown");
}

#[tokio::test]
async fn test_failed_watch_open_is_retried() {
    let store = Arc::new(MemoryStore::new());
    store.fail_next(
        StoreOp::Watch,
        ObjectKind::Namespace,
        StoreError::Api("401: Unauthorized".into()),
    );
    let mut controller = controller(&store, 3);
    controller.start().expect("start");

    eventually("namespace watch reopened", || {
        watch_calls(&store, ObjectKind::Namespace) >= 2
            && store.watcher_count(ObjectKind::Namespace) == 1
    })
    .await;

    controller.stop().expect("stop");
    wait_with_timeout(&mut controller).await.expect("clean shutdown");
}
