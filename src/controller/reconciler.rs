//! # Reconciler
//!
//! Ties the classifier, policy and apply engine together:
//!
//! - secret/config map events fan out to every target namespace
//! - namespace events pull every managed source object into (or out of) that namespace
//! - [`resync_once`] re-ensures every managed object into every target namespace
//!
//! Nothing here retries. A failed apply is logged and healed by the next event
//! or the next resync pass.

use crate::controller::apply::apply;
use crate::controller::classifier::classify;
use crate::controller::policy::should_manage;
use crate::controller::registry::ManagedRegistry;
use crate::controller::resource::{object_name, ManagedResource};
use crate::controller::types::{Action, ApplyOutcome, ObjectKind, WatchEvent};
use crate::observability::metrics;
use crate::store::{ObjectStore, StoreError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// State shared by every worker
#[derive(Debug)]
pub struct SyncContext<S> {
    pub store: Arc<S>,
    pub registry: ManagedRegistry,
    /// Namespace the replicated secrets and config maps live in
    pub source_namespace: String,
}

impl<S: ObjectStore> SyncContext<S> {
    pub fn new(store: Arc<S>, source_namespace: impl Into<String>) -> Self {
        Self {
            store,
            registry: ManagedRegistry::new(),
            source_namespace: source_namespace.into(),
        }
    }

    /// Names of namespaces currently opted in as replication targets.
    ///
    /// The source namespace is never a target.
    pub async fn target_namespaces(&self) -> Result<Vec<String>, StoreError> {
        let namespaces: Vec<Namespace> = self.store.list(None).await?;
        Ok(namespaces
            .iter()
            .filter(|ns| should_manage(*ns))
            .map(|ns| object_name(ns).to_string())
            .filter(|name| !name.is_empty() && *name != self.source_namespace)
            .collect())
    }

    /// Source objects of kind `K` that opted into replication
    pub async fn managed_source_objects<K: ManagedResource>(&self) -> Result<Vec<K>, StoreError> {
        let objects: Vec<K> = self.store.list(Some(&self.source_namespace)).await?;
        Ok(objects.into_iter().filter(|obj| should_manage(obj)).collect())
    }
}

/// Per-kind handling of a watch event
#[async_trait]
pub trait WatchTarget: ManagedResource {
    async fn handle_event<S: ObjectStore>(ctx: &SyncContext<S>, event: WatchEvent<Self>);
}

#[async_trait]
impl WatchTarget for Secret {
    async fn handle_event<S: ObjectStore>(ctx: &SyncContext<S>, event: WatchEvent<Self>) {
        fan_out_object_event(ctx, event).await;
    }
}

#[async_trait]
impl WatchTarget for ConfigMap {
    async fn handle_event<S: ObjectStore>(ctx: &SyncContext<S>, event: WatchEvent<Self>) {
        fan_out_object_event(ctx, event).await;
    }
}

#[async_trait]
impl WatchTarget for Namespace {
    async fn handle_event<S: ObjectStore>(ctx: &SyncContext<S>, event: WatchEvent<Self>) {
        sync_namespace_event(ctx, event).await;
    }
}

/// Classify a secret or config map event and apply the action to every target namespace
pub async fn fan_out_object_event<S, K>(ctx: &SyncContext<S>, event: WatchEvent<K>)
where
    S: ObjectStore,
    K: ManagedResource,
{
    let Some((obj, action)) = classify(&ctx.registry, event) else {
        return;
    };
    if action == Action::Skip {
        return;
    }

    let targets = match ctx.target_namespaces().await {
        Ok(targets) => targets,
        Err(e) => {
            error!(
                kind = %K::KIND,
                name = object_name(&obj),
                action = %action,
                error = %e,
                "reconcile.list_namespaces_failed"
            );
            return;
        }
    };

    debug!(
        kind = %K::KIND,
        name = object_name(&obj),
        action = %action,
        targets = targets.len(),
        "reconcile.fan_out"
    );
    for namespace in &targets {
        apply(ctx.store.as_ref(), action, namespace, &obj).await;
    }
}

/// Classify a namespace event and, on a transition, apply the action for
/// every managed source object to that namespace only
pub async fn sync_namespace_event<S: ObjectStore>(ctx: &SyncContext<S>, event: WatchEvent<Namespace>) {
    let Some((namespace, action)) = classify(&ctx.registry, event) else {
        return;
    };
    if action == Action::Skip {
        return;
    }

    let target = object_name(&namespace);
    if target == ctx.source_namespace {
        debug!(namespace = target, "reconcile.skip_source_namespace");
        return;
    }

    info!(namespace = target, action = %action, "reconcile.namespace_transition");
    apply_sources::<S, Secret>(ctx, action, target).await;
    apply_sources::<S, ConfigMap>(ctx, action, target).await;
}

async fn apply_sources<S, K>(ctx: &SyncContext<S>, action: Action, target: &str)
where
    S: ObjectStore,
    K: ManagedResource,
{
    match ctx.managed_source_objects::<K>().await {
        Ok(objects) => {
            for obj in &objects {
                apply(ctx.store.as_ref(), action, target, obj).await;
            }
        }
        Err(e) => error!(
            namespace = target,
            kind = %K::KIND,
            action = %action,
            error = %e,
            "reconcile.list_sources_failed"
        ),
    }
}

/// Summary of one resync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncReport {
    pub namespaces: usize,
    pub secrets: usize,
    pub config_maps: usize,
    pub applied: usize,
    pub failed: usize,
}

/// Ensure every managed source object exists in every target namespace.
///
/// Never removes anything, neither replicas nor registry entries. Listed
/// objects are marked managed. A failed namespace listing aborts the pass; a
/// failed secret or config map listing only skips that kind.
pub async fn resync_once<S: ObjectStore>(ctx: &SyncContext<S>) -> ResyncReport {
    let started = Instant::now();
    metrics::increment_resync_ticks();
    info!(source_namespace = ctx.source_namespace.as_str(), "resync.tick");

    let mut report = ResyncReport::default();
    let targets = match ctx.target_namespaces().await {
        Ok(targets) => targets,
        Err(e) => {
            error!(error = %e, "resync.list_namespaces_failed");
            metrics::increment_resync_errors();
            return report;
        }
    };
    report.namespaces = targets.len();
    ctx.registry
        .lock()
        .mark_all_managed(ObjectKind::Namespace, targets.iter().map(String::as_str));

    let secrets = list_or_empty::<S, Secret>(ctx).await;
    let config_maps = list_or_empty::<S, ConfigMap>(ctx).await;
    report.secrets = secrets.len();
    report.config_maps = config_maps.len();

    for namespace in &targets {
        for secret in &secrets {
            report.record(apply(ctx.store.as_ref(), Action::Ensure, namespace, secret).await);
        }
        for config_map in &config_maps {
            report.record(apply(ctx.store.as_ref(), Action::Ensure, namespace, config_map).await);
        }
    }

    metrics::observe_resync_duration(started.elapsed().as_secs_f64());
    if report.failed > 0 {
        warn!(
            namespaces = report.namespaces,
            applied = report.applied,
            failed = report.failed,
            "resync.done_with_errors"
        );
    } else {
        info!(
            namespaces = report.namespaces,
            secrets = report.secrets,
            config_maps = report.config_maps,
            applied = report.applied,
            "resync.done"
        );
    }
    report
}

/// List managed source objects of kind `K` and mark them in the registry
async fn list_or_empty<S, K>(ctx: &SyncContext<S>) -> Vec<K>
where
    S: ObjectStore,
    K: ManagedResource,
{
    match ctx.managed_source_objects::<K>().await {
        Ok(objects) => {
            ctx.registry
                .lock()
                .mark_all_managed(K::KIND, objects.iter().map(object_name));
            objects
        }
        Err(e) => {
            error!(kind = %K::KIND, error = %e, "resync.list_sources_failed");
            metrics::increment_resync_errors();
            Vec::new()
        }
    }
}

impl ResyncReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Success => self.applied += 1,
            ApplyOutcome::Error(_) => self.failed += 1,
            ApplyOutcome::Noop | ApplyOutcome::Skipped => {}
        }
    }
}
