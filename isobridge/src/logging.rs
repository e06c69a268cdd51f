//! Tracing subscriber setup.
//!
//! Logs go to stderr and to a per-session file in the temp directory.
//! Standard output carries relayed protocol traffic only.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Per-session log file path: `<temp>/<session_id>.log`.
pub fn session_log_path(session_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{session_id}.log"))
}

/// Filter for the subscriber.
///
/// `debug` forces the `debug` level; otherwise `RUST_LOG` applies, with
/// `info` as the fallback.
pub fn build_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Returns the log file in use, or `None` when it could not be opened and
/// only stderr logging is active.
pub fn init_tracing(debug: bool, log_file: Option<&Path>) -> Option<PathBuf> {
    let stderr_layer: BoxedLayer = fmt::layer().with_writer(std::io::stderr).boxed();

    let (file_layer, opened) = match log_file.map(|p| (p, open_log_file(p))) {
        Some((path, Ok(file))) => {
            let layer: BoxedLayer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed();
            (Some(layer), Some(path.to_path_buf()))
        }
        Some((path, Err(e))) => {
            eprintln!(
                "isobridge: cannot open log file {}: {e}; logging to stderr only",
                path.display()
            );
            (None, None)
        }
        None => (None, None),
    };

    let layers: Vec<BoxedLayer> = std::iter::once(stderr_layer).chain(file_layer).collect();

    // A subscriber may already be installed (tests); keep it.
    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(build_filter(debug))
        .try_init();

    opened
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_log_path_in_temp_dir() {
        let path = session_log_path("isobridge_7_100");
        assert_eq!(path.parent(), Some(std::env::temp_dir().as_path()));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("isobridge_7_100.log")
        );
    }

    #[test]
    fn test_open_log_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.log");
        std::fs::write(&path, "first\n").unwrap();
        {
            use std::io::Write;
            let mut file = open_log_file(&path).unwrap();
            file.write_all(b"second\n").unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_unwritable_log_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("bridge.log");
        assert!(init_tracing(false, Some(&missing)).is_none());
    }
}
