//! Session and backend lifecycle types.
//!
//! These types model the bridge's state machine, how the backend ended, why
//! a session is shutting down, and the grace periods of the teardown.

use std::time::Duration;

use isobridge_core::config::BridgeSettings;

/// State of a bridge session.
///
/// Transitions only move forward:
/// `Init → Starting → Running → ShuttingDown → Stopped`, with
/// `Starting → Stopped` when the backend fails to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BridgeState {
    Init = 0,
    Starting = 1,
    Running = 2,
    ShuttingDown = 3,
    Stopped = 4,
}

impl BridgeState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Init,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            _ => Self::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

/// How the backend process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendExit {
    /// Process exited normally with an exit code.
    Exited {
        /// The process exit code.
        code: i32,
    },
    /// Process was killed by a signal (Unix only).
    Signalled {
        /// The signal number that terminated the process.
        signal: i32,
    },
    /// The exit status could not be collected.
    Unknown,
}

impl BackendExit {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited { code };
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signalled { signal };
            }
        }
        Self::Unknown
    }

    /// Process exit code to report for a backend that ended on its own.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Exited { code } => code,
            Self::Signalled { .. } | Self::Unknown => 1,
        }
    }
}

impl std::fmt::Display for BackendExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exit code {code}"),
            Self::Signalled { signal } => write!(f, "signal {signal}"),
            Self::Unknown => f.write_str("unknown status"),
        }
    }
}

/// Why a session left `Running`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A termination signal was received.
    Signal(&'static str),
    /// The backend exited on its own.
    BackendExited(BackendExit),
    /// Client input reached end of stream.
    ClientEof,
    /// A pump could not continue.
    PumpFailure(String),
    /// The session was cancelled programmatically.
    Cancelled,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal(_) => "signal",
            Self::BackendExited(_) => "backend_exited",
            Self::ClientEof => "client_eof",
            Self::PumpFailure(_) => "pump_failure",
            Self::Cancelled => "cancelled",
        }
    }

    /// Process exit code for a session that ended for this reason.
    ///
    /// A backend that ended on its own propagates its code. Any shutdown the
    /// bridge initiated is clean.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BackendExited(exit) => exit.exit_code(),
            _ => 0,
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {name}"),
            Self::BackendExited(exit) => write!(f, "backend exited ({exit})"),
            Self::ClientEof => f.write_str("client input closed"),
            Self::PumpFailure(why) => write!(f, "pump failure: {why}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Direction of a relayed stream, for logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    ClientToBackend,
    BackendToClient,
    Diagnostic,
}

impl std::fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ClientToBackend => "client→backend",
            Self::BackendToClient => "backend→client",
            Self::Diagnostic => "diagnostic",
        })
    }
}

/// Grace periods of the teardown sequence.
///
/// 1. Close the backend's stdin
/// 2. Wait `stdin_close_grace` for a voluntary exit
/// 3. Graceful termination request, wait `terminate_grace`
/// 4. Forced kill
/// 5. Drain backend output for at most `pump_drain_grace`
#[derive(Debug, Clone)]
pub struct ShutdownRequest {
    pub stdin_close_grace: Duration,
    pub terminate_grace: Duration,
    pub pump_drain_grace: Duration,
}

impl Default for ShutdownRequest {
    fn default() -> Self {
        Self::from(&BridgeSettings::default())
    }
}

impl From<&BridgeSettings> for ShutdownRequest {
    fn from(settings: &BridgeSettings) -> Self {
        Self {
            stdin_close_grace: settings.stdin_close_grace,
            terminate_grace: settings.terminate_grace,
            pump_drain_grace: settings.pump_drain_grace,
        }
    }
}
