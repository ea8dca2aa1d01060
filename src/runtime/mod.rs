//! # Runtime
//!
//! Long-running pieces of the controller process.
//!
//! - `initialization`: process setup (crypto provider, tracing, metrics, probe server, client)
//! - `watch_loop`: supervised watch worker per kind
//! - `resync`: periodic full resync
//! - `error_policy`: watch error classification and logging

pub mod error_policy;
pub mod initialization;
pub mod resync;
pub mod watch_loop;

use tokio::sync::watch;

/// Resolve once the stop signal is raised or its sender is gone
pub(crate) async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
