//! Per-invocation session context.
//!
//! One [`BridgeSession`] exists per bridge process. It carries the session
//! identity used in logs, the lifecycle state, the one-shot shutdown flag and
//! the cancellation tokens the pumps observe. It is shared by `Arc` with
//! every task instead of living in process-wide globals.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use super::lifecycle::{BridgeState, ShutdownReason};

#[derive(Debug)]
pub struct BridgeSession {
    id: String,
    started_at: Instant,
    state: AtomicU8,
    shutdown: AtomicBool,
    reason: OnceLock<ShutdownReason>,
    /// Cancelled to ask the controller to shut the session down.
    cancel: CancellationToken,
    /// Child of `cancel`, observed by the client→backend pump; cancelled
    /// first on shutdown.
    client: CancellationToken,
    /// Observed by the backend readers; cancelled after the drain grace.
    drain: CancellationToken,
}

impl BridgeSession {
    /// Create a session named `isobridge_<pid>_<unix_seconds>`.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::with_id(format!("isobridge_{}_{secs}", std::process::id()))
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let cancel = CancellationToken::new();
        let client = cancel.child_token();
        Self {
            id: id.into(),
            started_at: Instant::now(),
            state: AtomicU8::new(BridgeState::Init as u8),
            shutdown: AtomicBool::new(false),
            reason: OnceLock::new(),
            cancel,
            client,
            drain: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn state(&self) -> BridgeState {
        BridgeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move the state machine forward to `to`.
    ///
    /// Returns `false` and leaves the state alone when `to` is not ahead of
    /// the current state.
    pub fn advance(&self, to: BridgeState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if BridgeState::from_u8(current) >= to {
                return false;
            }
            match self.state.compare_exchange(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::debug!(
                        session_id = %self.id,
                        from = BridgeState::from_u8(current).as_str(),
                        to = to.as_str(),
                        "session state changed"
                    );
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Set the shutdown flag.
    ///
    /// Only the first caller gets `true`; its reason is recorded, the state
    /// moves to `ShuttingDown` and the client→backend pump is cancelled.
    pub fn begin_shutdown(&self, reason: ShutdownReason) -> bool {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            tracing::debug!(session_id = %self.id, %reason, "shutdown already in progress");
            return false;
        }
        tracing::info!(session_id = %self.id, %reason, "shutting down");
        let _ = self.reason.set(reason);
        self.advance(BridgeState::ShuttingDown);
        self.client.cancel();
        true
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn shutdown_reason(&self) -> Option<&ShutdownReason> {
        self.reason.get()
    }

    /// Ask the controller to shut the session down.
    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn client_token(&self) -> &CancellationToken {
        &self.client
    }

    pub fn drain_token(&self) -> &CancellationToken {
        &self.drain
    }
}

impl Default for BridgeSession {
    fn default() -> Self {
        Self::new()
    }
}
