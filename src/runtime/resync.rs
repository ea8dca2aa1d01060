//! # Resync Ticker
//!
//! Periodic full pass that heals missed or reordered watch events. The first
//! pass runs one interval after start; watch streams cover startup on their own.

use crate::controller::reconciler::{resync_once, SyncContext};
use crate::runtime::wait_for_stop;
use crate::store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// Run resync passes every `period` until stopped.
///
/// A pass in flight when the stop signal arrives runs to completion.
pub async fn run_resync_ticker<S: ObjectStore>(
    ctx: Arc<SyncContext<S>>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = period.as_secs(), "resync.started");

    loop {
        tokio::select! {
            biased;
            () = wait_for_stop(&mut stop) => break,
            _ = ticker.tick() => {
                resync_once(&ctx).await;
            }
        }
    }

    info!("resync.stopped");
}
