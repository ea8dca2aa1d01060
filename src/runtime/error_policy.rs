//! # Error Policy
//!
//! Classification of watch stream errors. Every class is retried with backoff
//! by the watch supervisor; the class only decides how loudly it is logged and
//! what an operator should check.

use tracing::{error, warn};

/// Broad cause of a watch stream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 410 Gone / expired resource version; normal, the watcher relists
    Expired,
    /// 429 or API server storage reinitialising
    Throttled,
    /// 401/403; RBAC revoked or token expired
    Unauthorized,
    /// 404; usually a deleted namespace scope
    NotFound,
    Other,
}

impl WatchErrorClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WatchErrorClass::Expired => "expired",
            WatchErrorClass::Throttled => "throttled",
            WatchErrorClass::Unauthorized => "unauthorized",
            WatchErrorClass::NotFound => "not_found",
            WatchErrorClass::Other => "other",
        }
    }
}

/// Classify a watch error from its rendered message.
///
/// 404 is checked before 401 since not-found errors can carry
/// `WatchFailed` wrappers that mention authorization.
#[must_use]
pub fn classify_watch_error(message: &str) -> WatchErrorClass {
    let is_not_found = message.contains("ObjectNotFound")
        || message.contains("404")
        || message.contains("not found");
    if is_not_found {
        return WatchErrorClass::NotFound;
    }
    if message.contains("410")
        || message.contains("too old resource version")
        || message.contains("Expired")
        || message.contains("Gone")
    {
        return WatchErrorClass::Expired;
    }
    if message.contains("429")
        || message.contains("storage is (re)initializing")
        || message.contains("TooManyRequests")
    {
        return WatchErrorClass::Throttled;
    }
    if message.contains("401")
        || message.contains("403")
        || message.contains("Unauthorized")
        || message.contains("Forbidden")
    {
        return WatchErrorClass::Unauthorized;
    }
    WatchErrorClass::Other
}

/// Log a watch stream failure according to its class
pub fn log_watch_error(kind: &str, class: WatchErrorClass, message: &str, failures: u32) {
    match class {
        WatchErrorClass::Expired => warn!(
            kind,
            failures,
            error = message,
            "watch.error.resource_version_expired: normal during API server restarts, watch will relist"
        ),
        WatchErrorClass::Throttled => warn!(
            kind,
            failures,
            error = message,
            "watch.error.throttled: API server busy, backing off"
        ),
        WatchErrorClass::Unauthorized => {
            error!(
                kind,
                failures,
                error = message,
                "watch.error.unauthorized: RBAC may have been revoked or the token expired"
            );
            error!("SRE diagnostics:");
            error!("   1. Verify the ClusterRole grants list/watch on namespaces and list/watch/create/update/delete on secrets and configmaps");
            error!("   2. Verify the ClusterRoleBinding still binds the controller ServiceAccount");
            error!("   3. kubectl auth can-i watch secrets --as=system:serviceaccount:<namespace>:<serviceaccount>");
        }
        WatchErrorClass::NotFound => warn!(
            kind,
            failures,
            error = message,
            "watch.error.not_found: watched scope may have been deleted"
        ),
        WatchErrorClass::Other => error!(kind, failures, error = message, "watch.error"),
    }
}
