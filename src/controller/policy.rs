//! # Object Policy
//!
//! Pure decisions about single objects:
//!
//! - [`should_manage`] reads the management annotation
//! - [`prepare_object`] produces a namespace-portable copy ready for create or update
//!
//! Only metadata is touched; `data`/`stringData`/`binaryData` pass through untouched.

use crate::constants::{LAST_APPLIED_CONFIG_ANNOTATION, MANAGED_ANNOTATION};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};
use tracing::warn;

/// Parse a boolean literal.
///
/// Accepts `1`, `t`, `T`, `TRUE`, `true`, `True` and their false counterparts.
/// Anything else (including `yes`/`no`) is rejected.
#[must_use]
pub fn parse_bool_literal(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Whether an object has opted into management via [`MANAGED_ANNOTATION`].
///
/// A missing annotation means unmanaged. A present but unparsable value is
/// logged as a warning and also treated as unmanaged.
pub fn should_manage<K: Resource>(obj: &K) -> bool {
    let Some(value) = obj.annotations().get(MANAGED_ANNOTATION) else {
        return false;
    };
    match parse_bool_literal(value) {
        Some(managed) => managed,
        None => {
            warn!(
                name = obj.name_any().as_str(),
                namespace = obj.namespace().as_deref().unwrap_or(""),
                annotation = MANAGED_ANNOTATION,
                value = value.as_str(),
                "policy.bad_annotation_value: expected a boolean literal, treating as unmanaged"
            );
            false
        }
    }
}

/// Copy `obj` into a form that can be written to any target namespace.
///
/// Returns `None` when the object is not managed. Otherwise the copy has its
/// namespace, self link, uid, resource version and managed fields cleared, its
/// creation timestamp reset to now, the `kubectl` last-applied annotation
/// dropped and the management annotation forced to `"true"`.
pub fn prepare_object<K: Resource + Clone>(obj: &K) -> Option<K> {
    if !should_manage(obj) {
        return None;
    }

    let mut prepared = obj.clone();
    let meta = prepared.meta_mut();
    meta.namespace = None;
    meta.self_link = None;
    meta.uid = None;
    meta.resource_version = None;
    meta.managed_fields = None;
    meta.creation_timestamp = creation_timestamp_now();

    let annotations = prepared.annotations_mut();
    annotations.remove(LAST_APPLIED_CONFIG_ANNOTATION);
    annotations.insert(MANAGED_ANNOTATION.to_string(), "true".to_string());

    Some(prepared)
}

/// Current time as a metadata timestamp.
///
/// Built from the RFC 3339 wire form; the inner type of `Time` differs between
/// k8s-openapi releases.
fn creation_timestamp_now() -> Option<Time> {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    serde_json::from_value(serde_json::Value::String(now)).ok()
}
