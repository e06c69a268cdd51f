//! Built-in defaults and environment overrides.

use std::time::Duration;

/// Name of the default backend server used when no configuration exists.
pub const DEFAULT_SERVER_NAME: &str = "serena";

/// Command of the default backend server.
pub const DEFAULT_SERVER_COMMAND: &str = "python";

/// Arguments of the default backend server.
pub const DEFAULT_SERVER_ARGS: &[&str] = &["-m", "serena.mcp_server"];

pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(500);
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_STDIN_CLOSE_GRACE: Duration = Duration::from_secs(1);
pub const DEFAULT_PUMP_DRAIN_GRACE: Duration = Duration::from_secs(2);
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum accepted line length on any relayed stream (10 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "ISOBRIDGE_CONFIG";

/// Environment variable forcing debug mode on or off.
pub const ENV_DEBUG: &str = "ISOBRIDGE_DEBUG";

/// Environment variable forcing path translation on or off.
pub const ENV_TRANSLATE_PATHS: &str = "ISOBRIDGE_TRANSLATE_PATHS";

/// File name of the shared activity log inside the temp directory.
pub const ACTIVITY_LOG_FILE: &str = "isobridge_activity.log";

/// Overrides read from the process environment.
///
/// Each field is `None` when the variable is unset or unparseable, leaving
/// the file value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub debug: Option<bool>,
    pub translate_paths: Option<bool>,
}

impl EnvOverrides {
    /// Read overrides from the real process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            debug: lookup(ENV_DEBUG).as_deref().and_then(parse_flag),
            translate_paths: lookup(ENV_TRANSLATE_PATHS).as_deref().and_then(parse_flag),
        }
    }
}

/// Parse a boolean environment flag.
///
/// Accepts `1/0`, `true/false`, `yes/no` and `on/off`, case-insensitive.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
