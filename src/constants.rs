//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Annotation marking a namespace, secret or config map as opted into replication
pub const MANAGED_ANNOTATION: &str = "nsync.verloop.io/managed";

/// Annotation written by `kubectl apply`; never replicated
pub const LAST_APPLIED_CONFIG_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Namespace used when no override or service account namespace is available
pub const DEFAULT_SOURCE_NAMESPACE: &str = "default";

/// Mounted service account namespace file
pub const SERVICE_ACCOUNT_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Default resync interval (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 255;

/// Minimum resync interval (seconds)
/// Shorter intervals hammer the API server with full listings
pub const MIN_RESYNC_INTERVAL_SECS: u64 = 10;

/// Maximum resync interval (seconds)
/// Longer intervals leave missed watch events unhealed for too long
pub const MAX_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Consecutive watch stream failures tolerated before the worker gives up
pub const DEFAULT_WATCH_MAX_RETRIES: u32 = 10;

/// Default delay before reopening a watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;
