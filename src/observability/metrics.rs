//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `nsync_apply_total` - Apply attempts by kind, action and outcome
//! - `nsync_watch_events_total` - Watch events received by kind and event type
//! - `nsync_watch_restarts_total` - Watch stream failures by kind
//! - `nsync_resync_ticks_total` - Completed resync passes
//! - `nsync_resync_errors_total` - Resync passes aborted or degraded by a list failure
//! - `nsync_resync_duration_seconds` - Duration of resync passes
//! - `nsync_managed_objects` - Objects currently in the managed registry, by kind

use crate::controller::types::{Action, ApplyOutcome, ObjectKind};
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static APPLY_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "nsync_apply_total",
            "Total number of apply attempts by kind, action and outcome",
        ),
        &["kind", "action", "outcome"],
    )
    .expect("Failed to create APPLY_TOTAL metric - this should never happen")
});

static WATCH_EVENTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "nsync_watch_events_total",
            "Total number of watch events received by kind and event type",
        ),
        &["kind", "event"],
    )
    .expect("Failed to create WATCH_EVENTS_TOTAL metric - this should never happen")
});

static WATCH_RESTARTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "nsync_watch_restarts_total",
            "Total number of watch stream failures by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create WATCH_RESTARTS_TOTAL metric - this should never happen")
});

static RESYNC_TICKS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("nsync_resync_ticks_total", "Total number of resync passes")
        .expect("Failed to create RESYNC_TICKS_TOTAL metric - this should never happen")
});

static RESYNC_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "nsync_resync_errors_total",
        "Total number of list failures during resync passes",
    )
    .expect("Failed to create RESYNC_ERRORS_TOTAL metric - this should never happen")
});

static RESYNC_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "nsync_resync_duration_seconds",
            "Duration of resync passes in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create RESYNC_DURATION metric - this should never happen")
});

static MANAGED_OBJECTS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "nsync_managed_objects",
            "Current number of objects in the managed registry by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create MANAGED_OBJECTS metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only if a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(APPLY_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_EVENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_RESTARTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESYNC_TICKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESYNC_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESYNC_DURATION.clone()))?;
    REGISTRY.register(Box::new(MANAGED_OBJECTS.clone()))?;

    Ok(())
}

pub fn increment_apply(kind: ObjectKind, action: Action, outcome: &ApplyOutcome) {
    APPLY_TOTAL
        .with_label_values(&[kind.as_str(), action.as_str(), outcome.as_str()])
        .inc();
}

pub fn increment_watch_events(kind: ObjectKind, event: &str) {
    WATCH_EVENTS_TOTAL
        .with_label_values(&[kind.as_str(), event])
        .inc();
}

pub fn increment_watch_restarts(kind: ObjectKind) {
    WATCH_RESTARTS_TOTAL.with_label_values(&[kind.as_str()]).inc();
}

pub fn increment_resync_ticks() {
    RESYNC_TICKS_TOTAL.inc();
}

pub fn increment_resync_errors() {
    RESYNC_ERRORS_TOTAL.inc();
}

pub fn observe_resync_duration(duration: f64) {
    RESYNC_DURATION.observe(duration);
}

pub fn set_managed_objects(kind: ObjectKind, count: usize) {
    MANAGED_OBJECTS
        .with_label_values(&[kind.as_str()])
        .set(i64::try_from(count).unwrap_or(i64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        assert!(register_metrics().is_ok());
        // second registration is rejected by the registry
        assert!(register_metrics().is_err());
    }

    #[test]
    fn test_increment_apply_labels() {
        let counter = APPLY_TOTAL.with_label_values(&["Secret", "Remove", "success"]);
        let before = counter.get();
        increment_apply(ObjectKind::Secret, Action::Remove, &ApplyOutcome::Success);
        assert_eq!(counter.get(), before + 1);
    }

    #[test]
    fn test_increment_apply_error_outcome() {
        let counter = APPLY_TOTAL.with_label_values(&["ConfigMap", "Ensure", "error"]);
        let before = counter.get();
        increment_apply(
            ObjectKind::ConfigMap,
            Action::Ensure,
            &ApplyOutcome::Error("boom".into()),
        );
        assert_eq!(counter.get(), before + 1);
    }

    #[test]
    fn test_increment_watch_restarts() {
        let before = WATCH_RESTARTS_TOTAL.with_label_values(&["Namespace"]).get();
        increment_watch_restarts(ObjectKind::Namespace);
        assert_eq!(
            WATCH_RESTARTS_TOTAL.with_label_values(&["Namespace"]).get(),
            before + 1
        );
    }

    #[test]
    fn test_observe_resync_duration() {
        let before = RESYNC_DURATION.get_sample_count();
        observe_resync_duration(0.25);
        assert!(RESYNC_DURATION.get_sample_count() > before);
    }
}
