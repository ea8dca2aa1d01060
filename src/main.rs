//! # nsync Controller
//!
//! Kubernetes controller that mirrors opted-in Secrets and ConfigMaps from a
//! source namespace into opted-in namespaces.
//!
//! ## Overview
//!
//! 1. **Namespaces** annotated `nsync.verloop.io/managed: "true"` are replication targets
//! 2. **Secrets and ConfigMaps** in the source namespace with the same annotation are copied into every target
//! 3. **Opting out** (annotation removed or false, or the source deleted) removes the replicas
//! 4. **Periodic resync** re-ensures everything to heal missed watch events
//!
//! The source namespace is `--source-namespace`, else `POD_NAMESPACE`, else the
//! service account namespace, else `default`.

use anyhow::{Context, Result};
use clap::Parser;
use nsync_controller::cli::Cli;
use nsync_controller::config::ControllerConfig;
use nsync_controller::controller::{ControllerSettings, StopHandle, SyncController};
use nsync_controller::runtime::initialization::{build_client, init_process, spawn_probe_server};
use nsync_controller::store::KubeStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "controller exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_process()?;

    let config = cli.apply_to(ControllerConfig::from_env());
    info!(?config, "Loaded configuration");

    let ready = spawn_probe_server(config.metrics_port);
    let client = build_client(&config).await?;

    let settings = ControllerSettings::from_config(&config);
    let mut controller =
        SyncController::new(Arc::new(KubeStore::new(client)), settings).with_readiness(ready);
    controller.start().context("Failed to start controller")?;

    tokio::spawn(stop_on_signal(controller.stop_handle()));

    controller.wait().await.context("Controller stopped with a fatal error")?;
    info!("Shutdown complete");
    Ok(())
}

async fn stop_on_signal(handle: StopHandle) {
    shutdown_signal().await;
    info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
    handle.stop();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler, only SIGINT will stop the controller");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
