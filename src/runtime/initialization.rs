//! # Initialization
//!
//! Process setup: rustls crypto provider, tracing, metrics, the probe server
//! and the Kubernetes client.

use crate::config::ControllerConfig;
use crate::observability;
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};

/// Install the rustls provider and the tracing subscriber.
///
/// Must run before anything that logs or opens a TLS connection.
pub fn init_process() -> Result<()> {
    install_crypto_provider()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nsync_controller=info".into()),
        )
        .init();

    info!("Starting nsync controller");
    info!(
        build_timestamp = env!("NSYNC_BUILD_TIMESTAMP"),
        git_hash = env!("NSYNC_GIT_HASH"),
        "Build info"
    );

    observability::metrics::register_metrics().context("Failed to register metrics")?;
    Ok(())
}

/// Install ring as the process-wide rustls provider.
///
/// Fails when a provider is already installed.
pub fn install_crypto_provider() -> Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider: one is already installed");
    }
    Ok(())
}

/// Start the metrics and probe server in the background.
///
/// Returns the readiness flag served on `/readyz`, initially not ready.
pub fn spawn_probe_server(port: u16) -> Arc<AtomicBool> {
    let is_ready = Arc::new(AtomicBool::new(false));
    let state = Arc::new(ServerState {
        is_ready: Arc::clone(&is_ready),
    });

    tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!(port, error = %e, "HTTP server error");
        }
    });

    is_ready
}

/// Build a Kubernetes client, from an explicit kubeconfig file when given
pub async fn build_client(config: &ControllerConfig) -> Result<Client> {
    match config.kubeconfig.as_deref() {
        Some(path) => client_from_kubeconfig(path).await,
        None => Client::try_default()
            .await
            .context("Failed to create Kubernetes client from in-cluster or default config"),
    }
}

async fn client_from_kubeconfig(path: &Path) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .with_context(|| format!("Failed to load kubeconfig {}", path.display()))?;
    info!(kubeconfig = %path.display(), "Using explicit kubeconfig");
    Client::try_from(config).context("Failed to create Kubernetes client from kubeconfig")
}
