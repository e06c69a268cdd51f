//! Teardown sequence for the backend.

use crate::bridge::lifecycle::{BackendExit, ShutdownReason, ShutdownRequest};
use crate::bridge::session::BridgeSession;
use crate::bridge::supervisor::BackendControl;

/// Stop the backend.
///
/// 1. Close stdin (done by cancelling the client→backend pump)
/// 2. Wait `stdin_close_grace` for the backend to exit on its own
/// 3. Graceful termination request, wait `terminate_grace`
/// 4. Forced kill, then wait for the exit to be confirmed
pub async fn shutdown_backend(backend: &dyn BackendControl, req: &ShutdownRequest) -> BackendExit {
    if let Some(exit) = backend.exit_status() {
        tracing::debug!(pid = backend.pid(), %exit, "backend already exited");
        return exit;
    }

    tracing::info!(pid = backend.pid(), "stopping backend");

    match tokio::time::timeout(req.stdin_close_grace, backend.wait_exit()).await {
        Ok(exit) => {
            tracing::info!(pid = backend.pid(), %exit, "backend exited after stdin close");
            return exit;
        }
        Err(_) => {
            tracing::info!(pid = backend.pid(), "backend did not exit within stdin_close_grace");
        }
    }

    backend.terminate(req.terminate_grace).await
}

/// Run the shutdown path once per session.
///
/// The first caller sets the session's shutdown flag and stops the backend.
/// Every later or concurrent caller gets `None` and touches nothing.
pub async fn shutdown_session(
    session: &BridgeSession,
    backend: &dyn BackendControl,
    reason: ShutdownReason,
    req: &ShutdownRequest,
) -> Option<BackendExit> {
    if !session.begin_shutdown(reason) {
        return None;
    }
    Some(shutdown_backend(backend, req).await)
}
