//! # CLI
//!
//! Command-line flags for the controller binary. Every flag is optional and
//! overrides the matching environment variable.
//!
//! ```bash
//! nsync-controller --kubeconfig ~/.kube/config --source-namespace platform --resync-interval 60
//! ```

use crate::config::ControllerConfig;
use clap::Parser;
use std::path::PathBuf;

/// Replicates annotated Secrets and ConfigMaps into opted-in namespaces
#[derive(Debug, Parser)]
#[command(name = "nsync-controller", version, about, long_about = None)]
pub struct Cli {
    /// Path to a kubeconfig file (defaults to in-cluster config, then ~/.kube/config)
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Seconds between full resync passes, clamped to 10..=300
    #[arg(long, value_name = "SECS")]
    pub resync_interval: Option<u64>,

    /// Namespace holding the source objects
    #[arg(long, value_name = "NAMESPACE")]
    pub source_namespace: Option<String>,

    /// Port for /metrics, /healthz and /readyz
    #[arg(long, value_name = "PORT")]
    pub metrics_port: Option<u16>,
}

impl Cli {
    /// Layer these flags over `base`
    #[must_use]
    pub fn apply_to(self, base: ControllerConfig) -> ControllerConfig {
        base.with_overrides(
            self.resync_interval,
            self.source_namespace,
            self.kubeconfig,
            self.metrics_port,
        )
    }
}
