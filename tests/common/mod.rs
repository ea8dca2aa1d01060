//! Common test utilities
//!
//! Object builders for the replicated kinds, a polling helper for
//! asynchronous assertions, and one-time tracing setup.

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use nsync_controller::constants::MANAGED_ANNOTATION;
use nsync_controller::runtime::watch_loop::WatchPolicy;
use std::collections::BTreeMap;
use std::sync::Once;
use std::time::Duration;

pub const SOURCE: &str = "platform";

static TRACING_INIT: Once = Once::new();

/// Route controller logs to the test harness output
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("nsync_controller=debug")
            .with_test_writer()
            .try_init();
    });
}

fn meta(namespace: Option<&str>, name: &str, managed: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        annotations: managed
            .map(|v| BTreeMap::from([(MANAGED_ANNOTATION.to_string(), v.to_string())])),
        ..Default::default()
    }
}

pub fn namespace(name: &str, managed: Option<&str>) -> Namespace {
    Namespace {
        metadata: meta(None, name, managed),
        ..Default::default()
    }
}

pub fn secret(name: &str, managed: Option<&str>) -> Secret {
    Secret {
        metadata: meta(Some(SOURCE), name, managed),
        data: Some(BTreeMap::from([(
            "password".to_string(),
            ByteString(b"hunter2".to_vec()),
        )])),
        ..Default::default()
    }
}

pub fn config_map(name: &str, managed: Option<&str>) -> ConfigMap {
    ConfigMap {
        metadata: meta(Some(SOURCE), name, managed),
        data: Some(BTreeMap::from([(
            "LOG_LEVEL".to_string(),
            "info".to_string(),
        )])),
        ..Default::default()
    }
}

/// Watch policy with millisecond delays so supervisor paths run quickly
pub fn fast_policy(max_retries: u32) -> WatchPolicy {
    WatchPolicy {
        backoff_start: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
        max_retries,
        restart_delay_after_end: Duration::from_millis(5),
    }
}

/// Poll `check` until it holds, panicking after two seconds
pub async fn eventually<F: FnMut() -> bool>(what: &str, mut check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
