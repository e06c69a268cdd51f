//! isobridge CLI entry point.
//!
//! Loads configuration, sets up logging and the activity log, then runs one
//! bridge session between this process's stdio and the configured backend.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;

use isobridge::bridge::{BridgeOptions, BridgeSession, run_bridge};
use isobridge::cli::BridgeArgs;
use isobridge::logging::{init_tracing, session_log_path};
use isobridge_core::activity::{EventType, emit, open_sink};
use isobridge_core::config::{Config, EnvOverrides, load, validate};

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let args = BridgeArgs::parse();

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "bridge failed");
            eprintln!("isobridge: {e:#}");
            1
        }
    };

    std::process::exit(code);
}

async fn run(args: BridgeArgs) -> anyhow::Result<i32> {
    let env = EnvOverrides::from_env();

    let (mut config, source) = match load(args.config.as_deref(), &env) {
        Ok(loaded) => loaded,
        Err(e) => {
            init_tracing(args.debug || env.debug.unwrap_or(false), None);
            return Err(e).context("failed to load configuration");
        }
    };
    apply_cli(&mut config, &args);

    let session = Arc::new(BridgeSession::new());
    let log_file = init_tracing(config.bridge.debug, Some(&session_log_path(session.id())));

    tracing::info!(
        session_id = session.id(),
        pid = std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
        config = %source,
        debug = config.bridge.debug,
        "isobridge starting"
    );
    for warning in validate(&config).warnings {
        tracing::warn!(session_id = session.id(), "configuration: {warning}");
    }

    let activity = open_sink(config.bridge.activity_log.as_deref(), session.id());
    emit(
        activity.as_ref(),
        EventType::BridgeStart,
        json!({
            "pid": std::process::id(),
            "debug_mode": config.bridge.debug,
            "log_file": log_file.as_ref().map(|p| p.display().to_string()),
        }),
    );

    let opts = BridgeOptions::from_config(&config, &args.command);
    if opts.spec.command.trim().is_empty() {
        anyhow::bail!("server '{}' has no command to run", opts.spec.name);
    }
    let server = opts.spec.name.clone();

    run_bridge(
        session,
        opts,
        tokio::io::stdin(),
        tokio::io::stdout(),
        activity,
    )
    .await
    .with_context(|| format!("bridge to server '{server}' failed"))
}

/// Command-line flags win over file and environment settings.
fn apply_cli(config: &mut Config, args: &BridgeArgs) {
    if args.debug {
        config.bridge.debug = true;
    }
    if args.no_translate_paths {
        config.bridge.translate_paths = false;
    }
}
