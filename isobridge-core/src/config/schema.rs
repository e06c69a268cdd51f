//! Configuration file schema.
//!
//! The file is JSON with two top-level sections: `mcpServers`, the backend
//! definitions in the common MCP client format, and `bridge`, the relay
//! settings. Unknown keys are ignored everywhere so files written for older
//! bridges (for example with `max_restarts`) still load.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::defaults::{
    DEFAULT_MAX_LINE_BYTES, DEFAULT_MONITOR_INTERVAL, DEFAULT_PUMP_DRAIN_GRACE,
    DEFAULT_SERVER_ARGS, DEFAULT_SERVER_COMMAND, DEFAULT_SERVER_NAME, DEFAULT_STARTUP_GRACE,
    DEFAULT_STDIN_CLOSE_GRACE, DEFAULT_TERMINATE_GRACE,
};

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend server definitions, in file order.
    #[serde(rename = "mcpServers")]
    pub servers: ServerTable,

    /// Relay and process-management settings.
    pub bridge: BridgeSettings,
}

// ─────────────────────────────────────────────────────────────────────────────
// Servers
// ─────────────────────────────────────────────────────────────────────────────

/// One backend server definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerEntry {
    /// Filled from the `mcpServers` key, not from the entry body.
    #[serde(skip)]
    pub name: String,

    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Overlay merged onto the bridge's own environment; overlay wins.
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ServerEntry {
    /// The built-in default backend.
    pub fn builtin_default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            command: DEFAULT_SERVER_COMMAND.to_string(),
            args: DEFAULT_SERVER_ARGS.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
            cwd: None,
        }
    }
}

/// Ordered table of server definitions.
///
/// Deserialized entry by entry so the order of the file is kept; the first
/// entry is the one the bridge launches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerTable(Vec<ServerEntry>);

impl ServerTable {
    pub fn new(entries: Vec<ServerEntry>) -> Self {
        Self(entries)
    }

    pub fn first(&self) -> Option<&ServerEntry> {
        self.0.first()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.name.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ServerTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of server name to server definition")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(1));
                while let Some((name, mut entry)) = map.next_entry::<String, ServerEntry>()? {
                    entry.name = name;
                    entries.push(entry);
                }
                Ok(ServerTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge settings
// ─────────────────────────────────────────────────────────────────────────────

/// Relay and process-management settings (`bridge` section).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Debug logging including per-message traffic.
    pub debug: bool,

    /// Rewrite `/mnt/<drive>/...` strings in client→backend messages.
    pub translate_paths: bool,

    /// Rewrite a `/mnt/<drive>/...` backend command into a `cmd.exe` launch.
    pub translate_command: bool,

    /// Wait after spawn before the first liveness check.
    #[serde(with = "super::duration_format")]
    pub startup_grace: Duration,

    /// Wait after the graceful termination request before the forced kill.
    #[serde(with = "super::duration_format")]
    pub terminate_grace: Duration,

    /// Wait after closing the backend's stdin before requesting termination.
    #[serde(with = "super::duration_format")]
    pub stdin_close_grace: Duration,

    /// Upper bound on draining backend output after termination.
    #[serde(with = "super::duration_format")]
    pub pump_drain_grace: Duration,

    /// Period of the health monitor.
    #[serde(with = "super::duration_format")]
    pub monitor_interval: Duration,

    pub max_line_bytes: usize,

    /// Activity log location. Absent means the shared file in the temp
    /// directory; an empty string disables the activity log.
    pub activity_log: Option<PathBuf>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            debug: false,
            translate_paths: true,
            translate_command: false,
            startup_grace: DEFAULT_STARTUP_GRACE,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            stdin_close_grace: DEFAULT_STDIN_CLOSE_GRACE,
            pump_drain_grace: DEFAULT_PUMP_DRAIN_GRACE,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            activity_log: None,
        }
    }
}
