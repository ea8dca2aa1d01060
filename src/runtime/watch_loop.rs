//! # Watch Loop
//!
//! One long-lived worker per watched kind. Each worker pulls events from its
//! stream strictly in order and hands them to the kind's [`WatchTarget`]
//! handler.
//!
//! Stream failures are supervised rather than fatal: each failure backs off
//! exponentially and a delivered event resets the count. Once the consecutive
//! failure count exceeds the configured limit the worker returns
//! [`ControllerError::WatchExhausted`] and the process is expected to exit so
//! its supervisor can restart it.

use crate::controller::backoff::ExponentialBackoff;
use crate::controller::reconciler::{SyncContext, WatchTarget};
use crate::controller::ControllerError;
use crate::observability::metrics;
use crate::runtime::error_policy::{classify_watch_error, log_watch_error};
use crate::runtime::wait_for_stop;
use crate::store::ObjectStore;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Retry policy for a watch worker
#[derive(Debug, Clone)]
pub struct WatchPolicy {
    pub backoff_start: Duration,
    pub backoff_max: Duration,
    /// Consecutive stream failures tolerated before giving up
    pub max_retries: u32,
    /// Delay before reopening a stream that ended without error
    pub restart_delay_after_end: Duration,
}

impl Default for WatchPolicy {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            backoff_start: Duration::from_millis(DEFAULT_BACKOFF_START_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            max_retries: DEFAULT_WATCH_MAX_RETRIES,
            restart_delay_after_end: Duration::from_secs(DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS),
        }
    }
}

enum StreamEnd {
    Stopped,
    Ended,
}

/// Run the watch worker for kind `K` until stopped or the retry budget is spent.
///
/// `namespace: None` watches cluster-wide.
pub async fn run_watch_worker<S, K>(
    ctx: Arc<SyncContext<S>>,
    namespace: Option<String>,
    policy: WatchPolicy,
    mut stop: watch::Receiver<bool>,
) -> Result<(), ControllerError>
where
    S: ObjectStore,
    K: WatchTarget,
{
    let kind = K::KIND.as_str();
    let mut backoff = ExponentialBackoff::new(policy.backoff_start, policy.backoff_max);

    loop {
        if *stop.borrow() {
            break;
        }
        info!(kind, namespace = namespace.as_deref().unwrap_or("*"), "watch.started");
        let mut stream = ctx.store.watch::<K>(namespace.as_deref());

        let end = loop {
            let next = tokio::select! {
                biased;
                () = wait_for_stop(&mut stop) => break StreamEnd::Stopped,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    backoff.reset();
                    metrics::increment_watch_events(K::KIND, event.type_str());
                    debug!(kind, event = event.type_str(), "watch.event.received");
                    K::handle_event(&ctx, event).await;
                }
                Some(Err(e)) => {
                    let message = e.to_string();
                    let delay = backoff.next_delay();
                    let failures = backoff.failures();
                    metrics::increment_watch_restarts(K::KIND);
                    log_watch_error(kind, classify_watch_error(&message), &message, failures);

                    if failures > policy.max_retries {
                        error!(kind, failures, "watch.exhausted: giving up on watch stream");
                        return Err(ControllerError::WatchExhausted {
                            kind: K::KIND,
                            failures,
                            last_error: message,
                        });
                    }

                    warn!(kind, failures, delay_ms = delay.as_millis(), "watch.backoff");
                    if sleep_or_stop(delay, &mut stop).await {
                        break StreamEnd::Stopped;
                    }
                }
                None => break StreamEnd::Ended,
            }
        };

        match end {
            StreamEnd::Stopped => break,
            StreamEnd::Ended => {
                warn!(
                    kind,
                    delay_secs = policy.restart_delay_after_end.as_secs_f64(),
                    "watch.ended: reopening stream"
                );
                if sleep_or_stop(policy.restart_delay_after_end, &mut stop).await {
                    break;
                }
            }
        }
    }

    info!(kind, "watch.stopped");
    Ok(())
}

/// Sleep for `delay`, returning `true` if the stop signal fired first
async fn sleep_or_stop(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        () = wait_for_stop(stop) => true,
        () = tokio::time::sleep(delay) => false,
    }
}
