//! Configuration error and warning types.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration errors.
///
/// Only a file that exists but cannot be read or parsed is fatal. A missing
/// file falls back to built-in defaults and never produces an error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Explicitly requested config file does not exist.
    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but is not valid JSON for the schema.
    #[error("invalid configuration in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A duration string could not be parsed.
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// I/O error reading the config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal findings from [`validate`](super::loader::validate).
///
/// The bridge logs these and keeps running with the configuration as loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// `mcpServers` was empty; the built-in default server is used instead.
    NoServersDefined,

    /// More than one server is defined; only the first is used.
    ExtraServersIgnored { used: String, ignored: Vec<String> },

    /// Server command looks like a path but nothing exists there.
    CommandPathMissing { server: String, command: String },

    /// Server command is an empty string.
    EmptyCommand { server: String },

    /// `terminate_grace` of zero skips the graceful phase entirely.
    ZeroTerminateGrace,

    /// `max_line_bytes` of zero would drop every line; the default is used.
    ZeroMaxLineBytes,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoServersDefined => {
                write!(f, "mcpServers is empty, using the built-in default server")
            }
            Self::ExtraServersIgnored { used, ignored } => write!(
                f,
                "multiple servers defined, using '{used}' and ignoring {ignored:?}"
            ),
            Self::CommandPathMissing { server, command } => write!(
                f,
                "server '{server}' command path does not exist: {command}"
            ),
            Self::EmptyCommand { server } => write!(f, "server '{server}' has an empty command"),
            Self::ZeroTerminateGrace => write!(
                f,
                "bridge.terminate_grace is zero, the backend will be killed without a graceful phase"
            ),
            Self::ZeroMaxLineBytes => write!(
                f,
                "bridge.max_line_bytes is zero, falling back to the default limit"
            ),
        }
    }
}
