//! Bidirectional stdio relay between one client and one supervised backend.
//!
//! [`run_bridge`] starts the backend, runs the three pumps and the health
//! monitor as independent tasks, waits for the first shutdown trigger and
//! drives the teardown:
//!
//! 1. The client→backend pump is cancelled, closing the backend's stdin
//! 2. The backend gets `stdin_close_grace` to exit, then is terminated
//!    (graceful request, forced kill after `terminate_grace`)
//! 3. The backend→client and diagnostic pumps drain what the backend already
//!    wrote, for at most `pump_drain_grace`, then are cancelled
//!
//! Each stream end is owned by exactly one task, so no locking is needed
//! between pumps. The only shared state is the session's shutdown flag and
//! the backend's liveness.

mod backend_to_client;
mod client_to_backend;
mod diagnostics;
mod helpers;
mod monitor;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::task::JoinError;

use isobridge_core::activity::{ActivitySink, EventType, emit};
use isobridge_core::config::{BridgeSettings, Config};
use isobridge_core::stats::RelayStats;

use crate::error::BridgeError;

use super::lifecycle::{BridgeState, ShutdownReason, ShutdownRequest, StreamDirection};
use super::session::BridgeSession;
use super::signals::TerminationSignals;
use super::supervisor::{Backend, BackendControl, BackendSpec, ProcessSupervisor};

pub use backend_to_client::backend_to_client;
pub use client_to_backend::client_to_backend;
pub use diagnostics::diagnostics;
pub use helpers::{PumpEnd, RelayContext, bounded_read_line};
pub use monitor::monitor_loop;
pub use shutdown::{shutdown_backend, shutdown_session};

type PumpResult = Result<Result<PumpEnd, BridgeError>, JoinError>;

/// What to launch and how to relay.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub spec: BackendSpec,
    pub settings: BridgeSettings,
    pub max_line_bytes: usize,
}

impl BridgeOptions {
    /// Options for the configured backend.
    ///
    /// A non-empty `command_line` replaces the backend's command and
    /// arguments; its environment and working directory still apply.
    pub fn from_config(config: &Config, command_line: &[String]) -> Self {
        let server = config.selected_server();
        let spec = BackendSpec::from_server(&server, config.bridge.translate_command)
            .with_command_line(command_line);
        Self {
            spec,
            settings: config.bridge.clone(),
            max_line_bytes: config.max_line_bytes(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run_bridge — Session Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Run one bridge session to completion and return the process exit code.
///
/// # Errors
///
/// Returns [`BridgeError`] when signal handlers cannot be installed or the
/// backend fails to start. Failures after start-up end the session with an
/// exit code instead.
pub async fn run_bridge<I, O>(
    session: Arc<BridgeSession>,
    opts: BridgeOptions,
    client_in: I,
    client_out: O,
    activity: Arc<dyn ActivitySink>,
) -> Result<i32, BridgeError>
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let session_id: Arc<str> = Arc::from(session.id());
    let settings = &opts.settings;
    let spec = &opts.spec;

    session.advance(BridgeState::Starting);

    let mut signals = match TerminationSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            session.advance(BridgeState::Stopped);
            return Err(e);
        }
    };

    // ── Start the backend ────────────────────────────────────────────────
    let backend = match ProcessSupervisor::new(settings.startup_grace)
        .start(spec)
        .await
    {
        Ok(backend) => backend,
        Err(e) => {
            let (exit_code, diagnostic) = match &e {
                BridgeError::StartFailure {
                    exit_code,
                    diagnostic,
                } => (*exit_code, diagnostic.clone()),
                other => (-1, other.to_string()),
            };
            emit(
                activity.as_ref(),
                EventType::ServerStartFailed,
                json!({
                    "server_name": spec.name,
                    "exit_code": exit_code,
                    "diagnostic": diagnostic,
                }),
            );
            session.advance(BridgeState::Stopped);
            return Err(e);
        }
    };

    let Backend {
        handle,
        stdin,
        stdout,
        stderr,
    } = backend;
    let pid = handle.pid();
    let control: Arc<dyn BackendControl> = Arc::new(handle);

    emit(
        activity.as_ref(),
        EventType::ServerStart,
        json!({
            "server_name": spec.name,
            "server_pid": pid,
            "command": spec.command,
            "args": spec.args,
        }),
    );
    session.advance(BridgeState::Running);
    tracing::info!(
        session_id = %session_id,
        server = %spec.name,
        pid,
        translate_paths = settings.translate_paths,
        "bridge running"
    );

    // ── Spawn concurrent tasks ───────────────────────────────────────────
    let stats = Arc::new(RelayStats::new());
    let ctx = RelayContext {
        session_id: session_id.clone(),
        stats: stats.clone(),
        max_line_bytes: opts.max_line_bytes,
    };

    // Task 1: Client → Backend
    let mut a2s_handle = tokio::spawn(client_to_backend(
        ctx.clone(),
        settings.translate_paths,
        BufReader::new(client_in),
        stdin,
        control.clone(),
        session.client_token().clone(),
    ));

    // Task 2: Backend → Client
    let mut b2c_handle = tokio::spawn(backend_to_client(
        ctx.clone(),
        BufReader::new(stdout),
        client_out,
        session.drain_token().clone(),
    ));

    // Task 3: Backend stderr → log
    let mut diag_handle = tokio::spawn(diagnostics(
        ctx,
        BufReader::new(stderr),
        session.drain_token().clone(),
    ));

    // Task 4: Health monitor
    let monitor_handle = tokio::spawn(monitor_loop(
        session.clone(),
        control.clone(),
        stats.clone(),
        settings.monitor_interval,
        session.drain_token().clone(),
    ));

    // ── Wait for the first shutdown trigger ──────────────────────────────
    let req = ShutdownRequest::from(settings);
    let mut a2s_done = false;
    let mut b2c_done = false;

    // Triggers are checked in order, so a client EOF and the backend exit it
    // causes are attributed to the client.
    let reason = loop {
        tokio::select! {
            biased;
            name = signals.recv() => {
                tracing::info!(session_id = %session_id, signal = name, "received termination signal");
                break ShutdownReason::Signal(name);
            }
            _ = session.cancel_token().cancelled() => {
                break ShutdownReason::Cancelled;
            }
            result = &mut a2s_handle, if !a2s_done => {
                a2s_done = true;
                match flatten(result) {
                    Ok(PumpEnd::Eof) => {
                        tracing::info!(session_id = %session_id, "client→backend stream closed (client stdin EOF)");
                        break ShutdownReason::ClientEof;
                    }
                    // The exit itself arrives through wait_exit.
                    Ok(PumpEnd::BackendGone) => continue,
                    Ok(PumpEnd::Cancelled) => break ShutdownReason::Cancelled,
                    Ok(PumpEnd::WriteFailed(kind)) => {
                        let why = format!("write to backend stdin failed: {kind}");
                        break settle_reason(control.as_ref(), req.stdin_close_grace, why).await;
                    }
                    Err(why) => {
                        tracing::error!(session_id = %session_id, error = %why, "client→backend task failed");
                        break settle_reason(control.as_ref(), req.stdin_close_grace, why).await;
                    }
                }
            }
            result = &mut b2c_handle, if !b2c_done => {
                b2c_done = true;
                match flatten(result) {
                    // Backend closed its stdout; its exit follows.
                    Ok(PumpEnd::Eof) => {
                        tracing::debug!(session_id = %session_id, "backend→client stream closed (backend stdout EOF)");
                        continue;
                    }
                    Ok(PumpEnd::Cancelled) | Ok(PumpEnd::BackendGone) => continue,
                    Ok(PumpEnd::WriteFailed(kind)) => {
                        break ShutdownReason::PumpFailure(format!("write to client stdout failed: {kind}"));
                    }
                    Err(why) => {
                        tracing::error!(session_id = %session_id, error = %why, "backend→client task failed");
                        break ShutdownReason::PumpFailure(why);
                    }
                }
            }
            exit = control.wait_exit() => {
                tracing::info!(session_id = %session_id, %exit, "backend process exited");
                break ShutdownReason::BackendExited(exit);
            }
        }
    };

    // ── Teardown ─────────────────────────────────────────────────────────
    let exit = match shutdown_session(&session, control.as_ref(), reason.clone(), &req).await {
        Some(exit) => exit,
        None => control.wait_exit().await,
    };

    if !a2s_done {
        match tokio::time::timeout(req.pump_drain_grace, &mut a2s_handle).await {
            Ok(result) => log_pump_end(&session_id, StreamDirection::ClientToBackend, result),
            Err(_) => a2s_handle.abort(),
        }
    }

    let drained = tokio::time::timeout(req.pump_drain_grace, async {
        if !b2c_done {
            log_pump_end(
                &session_id,
                StreamDirection::BackendToClient,
                (&mut b2c_handle).await,
            );
        }
        log_pump_end(
            &session_id,
            StreamDirection::Diagnostic,
            (&mut diag_handle).await,
        );
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            session_id = %session_id,
            "backend output not drained within pump_drain_grace, cancelling readers"
        );
    }
    session.drain_token().cancel();
    b2c_handle.abort();
    diag_handle.abort();
    let _ = monitor_handle.await;

    // ── Final report ─────────────────────────────────────────────────────
    let snapshot = stats.snapshot();
    let uptime = session.uptime();
    tracing::info!(
        session_id = %session_id,
        reason = %reason,
        backend_exit = %exit,
        uptime_secs = uptime.as_secs(),
        stats = %snapshot,
        "final stats"
    );
    emit(
        activity.as_ref(),
        EventType::BridgeShutdown,
        json!({
            "server_pid": pid,
            "uptime_seconds": uptime.as_secs_f64(),
            "reason": reason.as_str(),
            "detail": reason.to_string(),
            "backend_exit": exit.to_string(),
            "stats": snapshot,
        }),
    );
    session.advance(BridgeState::Stopped);

    Ok(reason.exit_code())
}

/// Collapse a pump's join result into its end or a failure description.
fn flatten(result: PumpResult) -> Result<PumpEnd, String> {
    match result {
        Ok(Ok(end)) => Ok(end),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("task panicked: {e}")),
    }
}

fn log_pump_end(session_id: &str, direction: StreamDirection, result: PumpResult) {
    match flatten(result) {
        Ok(end) => tracing::debug!(session_id, %direction, ?end, "pump finished"),
        Err(why) => tracing::warn!(session_id, %direction, error = %why, "pump failed"),
    }
}

/// Attribute a pump failure to the backend if it exits shortly after.
async fn settle_reason(
    backend: &dyn BackendControl,
    grace: Duration,
    why: String,
) -> ShutdownReason {
    match tokio::time::timeout(grace, backend.wait_exit()).await {
        Ok(exit) => ShutdownReason::BackendExited(exit),
        Err(_) => ShutdownReason::PumpFailure(why),
    }
}
