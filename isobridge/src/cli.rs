//! CLI argument types for `isobridge`.
//!
//! Defined separately from `main.rs` so integration tests can parse them
//! directly.

use std::path::PathBuf;

use clap::Parser;

/// Per-client stdio bridge to a dedicated, supervised MCP backend.
///
/// Relays line-delimited JSON between this process's stdin/stdout and the
/// backend, rewriting `/mnt/<drive>/...` paths on the way in.
#[derive(Parser, Debug)]
#[command(name = "isobridge", version)]
pub struct BridgeArgs {
    /// Configuration file (default: $ISOBRIDGE_CONFIG, then the user config dir).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging, including per-message traffic.
    #[arg(short, long)]
    pub debug: bool,

    /// Forward client messages without rewriting paths.
    #[arg(long)]
    pub no_translate_paths: bool,

    /// Backend command and arguments (after `--`), replacing the configured one.
    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,
}
