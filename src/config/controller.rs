//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
/// CLI flags are applied on top with [`ControllerConfig::with_overrides`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Resync interval (seconds), already clamped
    pub resync_interval_secs: u64,
    /// Explicit source namespace, if one was given
    pub source_namespace_override: Option<String>,
    /// Path to a kubeconfig file; `None` uses in-cluster or default config
    pub kubeconfig: Option<PathBuf>,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Exponential backoff starting value (milliseconds)
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Consecutive watch failures tolerated before the worker gives up
    pub watch_max_retries: u32,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            source_namespace_override: None,
            kubeconfig: None,
            metrics_port: DEFAULT_METRICS_PORT,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_max_retries: DEFAULT_WATCH_MAX_RETRIES,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            resync_interval_secs: clamp_resync_interval(env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            )),
            source_namespace_override: env_var_non_empty("POD_NAMESPACE"),
            kubeconfig: None,
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            watch_max_retries: env_var_or_default("WATCH_MAX_RETRIES", DEFAULT_WATCH_MAX_RETRIES),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
        }
    }

    /// Apply command-line overrides; flags win over environment
    #[must_use]
    pub fn with_overrides(
        mut self,
        resync_interval_secs: Option<u64>,
        source_namespace: Option<String>,
        kubeconfig: Option<PathBuf>,
        metrics_port: Option<u16>,
    ) -> Self {
        if let Some(secs) = resync_interval_secs {
            self.resync_interval_secs = clamp_resync_interval(secs);
        }
        if let Some(ns) = source_namespace.filter(|ns| !ns.trim().is_empty()) {
            self.source_namespace_override = Some(ns);
        }
        if kubeconfig.is_some() {
            self.kubeconfig = kubeconfig;
        }
        if let Some(port) = metrics_port {
            self.metrics_port = port;
        }
        self
    }

    /// Get resync interval duration
    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get backoff start duration
    #[must_use]
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }

    /// Resolve the namespace that holds the source objects
    #[must_use]
    pub fn source_namespace(&self) -> String {
        resolve_source_namespace(
            self.source_namespace_override.as_deref(),
            Path::new(SERVICE_ACCOUNT_NAMESPACE_PATH),
        )
    }
}

/// Clamp a resync interval into the supported range
#[must_use]
pub fn clamp_resync_interval(secs: u64) -> u64 {
    let clamped = secs.clamp(MIN_RESYNC_INTERVAL_SECS, MAX_RESYNC_INTERVAL_SECS);
    if clamped != secs {
        warn!(
            requested_secs = secs,
            clamped_secs = clamped,
            "config.resync_interval.clamped"
        );
    }
    clamped
}

/// Resolve the source namespace.
///
/// Order: explicit override, the service account namespace file at
/// `token_path`, then [`DEFAULT_SOURCE_NAMESPACE`]. Blank values fall through.
#[must_use]
pub fn resolve_source_namespace(override_ns: Option<&str>, token_path: &Path) -> String {
    if let Some(ns) = override_ns.map(str::trim).filter(|ns| !ns.is_empty()) {
        return ns.to_string();
    }

    match std::fs::read_to_string(token_path) {
        Ok(contents) => {
            let ns = contents.trim();
            if !ns.is_empty() {
                return ns.to_string();
            }
        }
        Err(e) => debug!(
            path = %token_path.display(),
            error = %e,
            "config.source_namespace.file_unreadable"
        ),
    }

    DEFAULT_SOURCE_NAMESPACE.to_string()
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable, treating blank as unset
fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "nsync-{}-{}",
            name,
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, contents).expect("write scratch file");
        path
    }

    #[test]
    fn test_clamp_resync_interval() {
        assert_eq!(clamp_resync_interval(1), MIN_RESYNC_INTERVAL_SECS);
        assert_eq!(clamp_resync_interval(255), 255);
        assert_eq!(clamp_resync_interval(3600), MAX_RESYNC_INTERVAL_SECS);
    }

    #[test]
    fn test_override_wins() {
        let path = scratch_file("ns", "from-file\n");
        assert_eq!(resolve_source_namespace(Some("platform"), &path), "platform");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_blank_override_falls_through_to_file() {
        let path = scratch_file("ns", "  kube-sync \n");
        assert_eq!(resolve_source_namespace(Some("   "), &path), "kube-sync");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_uses_default() {
        let path = std::env::temp_dir().join(format!("nsync-missing-{}", uuid::Uuid::new_v4()));
        assert_eq!(resolve_source_namespace(None, &path), DEFAULT_SOURCE_NAMESPACE);
    }

    #[test]
    fn test_empty_file_uses_default() {
        let path = scratch_file("empty", "\n");
        assert_eq!(resolve_source_namespace(None, &path), DEFAULT_SOURCE_NAMESPACE);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_cli_overrides() {
        let config = ControllerConfig::default().with_overrides(
            Some(5),
            Some("platform".to_string()),
            Some(PathBuf::from("/tmp/kubeconfig")),
            Some(9090),
        );
        assert_eq!(config.resync_interval_secs, MIN_RESYNC_INTERVAL_SECS);
        assert_eq!(config.source_namespace_override.as_deref(), Some("platform"));
        assert_eq!(config.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn test_absent_overrides_keep_values() {
        let config = ControllerConfig::default().with_overrides(None, Some(String::new()), None, None);
        assert_eq!(config.resync_interval(), Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS));
        assert!(config.source_namespace_override.is_none());
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(config.backoff_start_duration(), Duration::from_millis(1000));
        assert_eq!(config.backoff_max_duration(), Duration::from_millis(30_000));
    }
}
