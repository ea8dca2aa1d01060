//! # Sync Controller
//!
//! Lifecycle of the replication engine. `start` spawns one watch worker per
//! kind plus the resync ticker and returns immediately; `stop` raises a shared
//! stop signal that every worker observes at its next event or tick boundary;
//! `wait` drains the workers and surfaces the first fatal error.

use crate::config::ControllerConfig;
use crate::controller::reconciler::SyncContext;
use crate::controller::types::ObjectKind;
use crate::runtime::resync::run_resync_ticker;
use crate::runtime::watch_loop::{run_watch_worker, WatchPolicy};
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, Instrument};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller already started")]
    AlreadyStarted,

    #[error("controller not started")]
    NotStarted,

    #[error("{kind} watch gave up after {failures} consecutive failures: {last_error}")]
    WatchExhausted {
        kind: ObjectKind,
        failures: u32,
        last_error: String,
    },

    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Runtime settings for a [`SyncController`]
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub source_namespace: String,
    pub resync_interval: Duration,
    pub watch: WatchPolicy,
}

impl ControllerSettings {
    #[must_use]
    pub fn new(source_namespace: impl Into<String>, resync_interval: Duration) -> Self {
        Self {
            source_namespace: source_namespace.into(),
            resync_interval,
            watch: WatchPolicy::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            source_namespace: config.source_namespace(),
            resync_interval: config.resync_interval(),
            watch: WatchPolicy {
                backoff_start: config.backoff_start_duration(),
                backoff_max: config.backoff_max_duration(),
                max_retries: config.watch_max_retries,
                restart_delay_after_end: config.watch_restart_delay_after_end_duration(),
            },
        }
    }
}

/// Cloneable handle that stops a running controller from another task
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    ready: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.ready.store(false, Ordering::Relaxed);
        if !self.stop_tx.send_replace(true) {
            info!("controller.stopping");
        }
    }
}

pub struct SyncController<S: ObjectStore> {
    ctx: Arc<SyncContext<S>>,
    settings: ControllerSettings,
    stop: StopHandle,
    workers: Option<JoinSet<Result<(), ControllerError>>>,
    started: bool,
}

impl<S: ObjectStore> std::fmt::Debug for SyncController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("source_namespace", &self.settings.source_namespace)
            .field("started", &self.started)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl<S: ObjectStore> SyncController<S> {
    pub fn new(store: Arc<S>, settings: ControllerSettings) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            ctx: Arc::new(SyncContext::new(store, settings.source_namespace.clone())),
            settings,
            stop: StopHandle {
                stop_tx: Arc::new(stop_tx),
                ready: Arc::new(AtomicBool::new(false)),
            },
            workers: None,
            started: false,
        }
    }

    /// Share an externally owned readiness flag, e.g. the probe server's
    #[must_use]
    pub fn with_readiness(mut self, ready: Arc<AtomicBool>) -> Self {
        self.stop.ready = ready;
        self
    }

    /// Shared state used by the workers
    #[must_use]
    pub fn context(&self) -> &Arc<SyncContext<S>> {
        &self.ctx
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.stop.ready.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Spawn the watch workers and the resync ticker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        if self.started {
            return Err(ControllerError::AlreadyStarted);
        }
        self.started = true;

        let source = self.settings.source_namespace.clone();
        let policy = self.settings.watch.clone();
        let mut workers = JoinSet::new();

        workers.spawn(
            run_watch_worker::<S, Namespace>(
                Arc::clone(&self.ctx),
                None,
                policy.clone(),
                self.stop.stop_tx.subscribe(),
            )
            .instrument(info_span!("controller.watch", kind = ObjectKind::Namespace.as_str())),
        );
        workers.spawn(
            run_watch_worker::<S, Secret>(
                Arc::clone(&self.ctx),
                Some(source.clone()),
                policy.clone(),
                self.stop.stop_tx.subscribe(),
            )
            .instrument(info_span!("controller.watch", kind = ObjectKind::Secret.as_str())),
        );
        workers.spawn(
            run_watch_worker::<S, ConfigMap>(
                Arc::clone(&self.ctx),
                Some(source.clone()),
                policy,
                self.stop.stop_tx.subscribe(),
            )
            .instrument(info_span!("controller.watch", kind = ObjectKind::ConfigMap.as_str())),
        );

        let ctx = Arc::clone(&self.ctx);
        let period = self.settings.resync_interval;
        let stop = self.stop.stop_tx.subscribe();
        workers.spawn(
            async move {
                run_resync_ticker(ctx, period, stop).await;
                Ok(())
            }
            .instrument(info_span!("controller.resync")),
        );

        self.workers = Some(workers);
        self.stop.ready.store(true, Ordering::Relaxed);
        info!(
            source_namespace = %source,
            resync_interval_secs = period.as_secs(),
            "controller.started"
        );
        Ok(())
    }

    /// Signal every worker to stop
    pub fn stop(&self) -> Result<(), ControllerError> {
        if !self.started {
            return Err(ControllerError::NotStarted);
        }
        self.stop.stop();
        Ok(())
    }

    /// Wait for every worker to finish.
    ///
    /// A fatal worker error stops the remaining workers; the first such error
    /// is returned once all of them have drained.
    pub async fn wait(&mut self) -> Result<(), ControllerError> {
        let Some(mut workers) = self.workers.take() else {
            return Err(ControllerError::NotStarted);
        };

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(join_err) => ControllerError::Worker(join_err.to_string()),
            };
            error!(error = %err, "controller.worker.failed");
            self.stop.stop();
            first_error.get_or_insert(err);
        }

        info!("controller.stopped");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
