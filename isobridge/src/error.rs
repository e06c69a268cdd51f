//! Error types for the relay and the backend supervisor.
//!
//! `FramingError` covers reading one line from a relayed stream: the size
//! bound and I/O. `BridgeError` covers failures that end a session: backend
//! start-up, missing pipes, signal registration and I/O. Configuration
//! failures stay `ConfigError` and are reported by `main` before a session
//! exists.
//!
//! Decode failures are not errors at all. A line that is not JSON is
//! forwarded raw.

use crate::bridge::lifecycle::StreamDirection;

/// Errors reading one line from a relayed stream.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// A single line exceeds the configured maximum size.
    ///
    /// The remainder of the line has been drained, so the reader is positioned
    /// at the start of the next line.
    #[error("line exceeds maximum size of {max_bytes} bytes")]
    MessageTooLarge {
        /// The configured maximum line size in bytes.
        max_bytes: usize,
    },

    /// An underlying I/O error on the stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that end a bridge session.
///
/// Only start-up failures and unrecoverable I/O reach `main`; everything
/// else is absorbed inside the pumps and logged.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The backend could not be spawned at all.
    #[error("failed to spawn backend '{command}': {reason}")]
    Spawn {
        /// The command that was executed.
        command: String,
        /// Human-readable description of the spawn failure.
        reason: String,
    },

    /// The backend exited during the start-up grace period.
    #[error("backend exited during start-up with code {exit_code}")]
    StartFailure {
        /// Exit code reported by the backend, `-1` when killed by a signal.
        exit_code: i32,
        /// Whatever the backend wrote to its diagnostic stream before exiting.
        diagnostic: String,
    },

    /// A pipe to the backend was not available after spawn.
    #[error("backend {stream} pipe unavailable")]
    PipeUnavailable {
        /// Which pipe (`stdin`, `stdout` or `stderr`).
        stream: &'static str,
    },

    /// Signal handlers could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(std::io::Error),

    /// Framing failure on a relayed stream.
    #[error("framing error on {direction} stream: {source}")]
    Framing {
        /// Which direction the error occurred on.
        direction: StreamDirection,
        /// The underlying framing error.
        source: FramingError,
    },

    /// An underlying I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_failure_display() {
        let err = BridgeError::StartFailure {
            exit_code: 2,
            diagnostic: "ModuleNotFoundError: serena".to_string(),
        };
        assert_eq!(err.to_string(), "backend exited during start-up with code 2");
    }

    #[test]
    fn test_framing_error_display() {
        let err = BridgeError::Framing {
            direction: StreamDirection::ClientToBackend,
            source: FramingError::MessageTooLarge { max_bytes: 16 },
        };
        assert_eq!(
            err.to_string(),
            "framing error on client→backend stream: line exceeds maximum size of 16 bytes"
        );
    }
}
