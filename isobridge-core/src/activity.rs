//! Best-effort activity log.
//!
//! Lifecycle events of every bridge on the host are appended as JSON lines to
//! one shared file, so an operator can see which sessions started which
//! backends and how they ended. Writing is best effort: a sink failure is
//! reported through [`ActivityError`] and then discarded by the caller. It
//! never affects the relay.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::ACTIVITY_LOG_FILE;

/// Failure to append an activity record.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("activity log I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("activity record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    BridgeStart,
    ServerStart,
    ServerStartFailed,
    BridgeShutdown,
}

/// One line of the activity log.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord<'a> {
    /// Unix time in seconds with sub-second precision.
    pub timestamp: f64,
    pub iso_timestamp: String,
    pub event_type: EventType,
    pub session_id: &'a str,
    pub data: Value,
}

impl<'a> ActivityRecord<'a> {
    pub fn now(session_id: &'a str, event_type: EventType, data: Value) -> Self {
        let utc = chrono::Utc::now();
        Self {
            timestamp: utc.timestamp_micros() as f64 / 1_000_000.0,
            iso_timestamp: utc
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            event_type,
            session_id,
            data,
        }
    }
}

/// Destination for activity records.
pub trait ActivitySink: Send + Sync {
    fn record(&self, event_type: EventType, data: Value) -> Result<(), ActivityError>;
}

/// Record an event and discard any failure.
pub fn emit(sink: &dyn ActivitySink, event_type: EventType, data: Value) {
    if let Err(e) = sink.record(event_type, data) {
        tracing::debug!(error = %e, ?event_type, "activity log write failed");
    }
}

/// Sink that drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ActivitySink for NullSink {
    fn record(&self, _event_type: EventType, _data: Value) -> Result<(), ActivityError> {
        Ok(())
    }
}

/// Appends JSON lines to a file shared between sessions.
///
/// The file is opened per record in append mode so concurrent bridges
/// interleave whole lines.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    session_id: String,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivitySink for FileSink {
    fn record(&self, event_type: EventType, data: Value) -> Result<(), ActivityError> {
        let record = ActivityRecord::now(&self.session_id, event_type, data);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let io_err = |source| ActivityError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(&line).map_err(io_err)
    }
}

/// Shared activity log in the system temp directory.
pub fn default_activity_log_path() -> PathBuf {
    std::env::temp_dir().join(ACTIVITY_LOG_FILE)
}

/// Build the sink for a configured `activity_log` setting.
///
/// `None` selects the default shared file; an empty path disables logging.
pub fn open_sink(setting: Option<&Path>, session_id: &str) -> Arc<dyn ActivitySink> {
    match setting {
        Some(path) if path.as_os_str().is_empty() => Arc::new(NullSink),
        Some(path) => Arc::new(FileSink::new(path, session_id)),
        None => Arc::new(FileSink::new(default_activity_log_path(), session_id)),
    }
}
