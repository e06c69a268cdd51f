//! Periodic health log of the session.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use isobridge_core::stats::RelayStats;

use crate::bridge::session::BridgeSession;
use crate::bridge::supervisor::BackendControl;

/// Log relay counters and backend liveness every `interval`.
///
/// Observation only: the monitor never terminates the backend and never
/// starts a shutdown. A zero interval disables it.
pub async fn monitor_loop(
    session: Arc<BridgeSession>,
    backend: Arc<dyn BackendControl>,
    stats: Arc<RelayStats>,
    interval: Duration,
    cancel: CancellationToken,
) {
    if interval.is_zero() {
        tracing::debug!(session_id = session.id(), "health monitor disabled");
        return;
    }

    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick (the relay just started).
    ticker.tick().await;

    let mut reported_dead = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = stats.snapshot();
        if backend.is_alive() {
            tracing::debug!(
                session_id = session.id(),
                pid = backend.pid(),
                uptime_secs = session.uptime().as_secs(),
                state = session.state().as_str(),
                stats = %snapshot,
                "health check"
            );
        } else if !reported_dead {
            reported_dead = true;
            tracing::warn!(
                session_id = session.id(),
                pid = backend.pid(),
                stats = %snapshot,
                "health check: backend not alive"
            );
        }
    }
}
