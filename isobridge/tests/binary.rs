//! End-to-end tests driving the built `isobridge` binary.
//!
//! The bridge runs as a child process with piped stdio and a temporary
//! configuration file; `cat` and `sh` stand in for the MCP backend.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

const TEST_TIMEOUT: Duration = Duration::from_secs(20);

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Write a config with one `cat` backend and an activity log in `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let config = json!({
        "mcpServers": {
            "echo": { "command": "cat" }
        },
        "bridge": {
            "startup_grace": "100ms",
            "stdin_close_grace": "500ms",
            "terminate_grace": "2s",
            "activity_log": dir.join("activity.log"),
        }
    });
    let path = dir.join("bridge.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
    path
}

fn spawn_bridge(args: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_isobridge"))
        .args(args)
        .env_remove("ISOBRIDGE_CONFIG")
        .env_remove("ISOBRIDGE_DEBUG")
        .env_remove("ISOBRIDGE_TRANSLATE_PATHS")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to spawn isobridge")
}

async fn exit_code(child: &mut Child) -> i32 {
    tokio::time::timeout(TEST_TIMEOUT, child.wait())
        .await
        .expect("isobridge did not exit")
        .unwrap()
        .code()
        .expect("isobridge killed by a signal")
}

async fn read_stderr(child: &mut Child) -> String {
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr).await;
    }
    stderr
}

fn activity_events(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("activity.log"))
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap())
        .map(|r| r["event_type"].as_str().unwrap().to_string())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_round_trip_through_binary() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let mut child = spawn_bridge(&["--config", config.to_str().unwrap()]);

    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap()).lines();

    stdin
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"params\":{\"uri\":\"/mnt/c/work/a.py\"}}\n")
        .await
        .unwrap();
    stdin.write_all(b"not json{{\n").await.unwrap();
    stdin.flush().await.unwrap();

    let first = tokio::time::timeout(TEST_TIMEOUT, stdout.next_line())
        .await
        .expect("no response")
        .unwrap()
        .unwrap();
    let first: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["params"]["uri"], r"C:\work\a.py");

    let second = tokio::time::timeout(TEST_TIMEOUT, stdout.next_line())
        .await
        .expect("no response")
        .unwrap();
    assert_eq!(second.as_deref(), Some("not json{{"));

    drop(stdin);
    assert_eq!(exit_code(&mut child).await, 0);

    // Nothing but relayed traffic on stdout.
    assert_eq!(stdout.next_line().await.unwrap(), None);

    assert_eq!(
        activity_events(dir.path()),
        vec!["BRIDGE_START", "SERVER_START", "BRIDGE_SHUTDOWN"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_translate_paths_flag() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let mut child = spawn_bridge(&[
        "--config",
        config.to_str().unwrap(),
        "--no-translate-paths",
    ]);

    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap()).lines();
    stdin.write_all(b"{\"p\":\"/mnt/c/x\"}\n").await.unwrap();

    let line = tokio::time::timeout(TEST_TIMEOUT, stdout.next_line())
        .await
        .expect("no response")
        .unwrap()
        .unwrap();
    assert_eq!(line, r#"{"p":"/mnt/c/x"}"#);

    drop(stdin);
    assert_eq!(exit_code(&mut child).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_backend_exit_code_is_bridge_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let mut child = spawn_bridge(&[
        "--config",
        config.to_str().unwrap(),
        "--",
        "sh",
        "-c",
        "sleep 0.4; exit 5",
    ]);

    assert_eq!(exit_code(&mut child).await, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_failure_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let mut child = spawn_bridge(&["--config", config.to_str().unwrap(), "--", "false"]);

    assert_eq!(exit_code(&mut child).await, 1);
    let stderr = read_stderr(&mut child).await;
    assert!(stderr.contains("isobridge:"), "{stderr}");
    assert_eq!(
        activity_events(dir.path()),
        vec!["BRIDGE_START", "SERVER_START_FAILED"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_explicit_config_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let mut child = spawn_bridge(&["--config", missing.to_str().unwrap()]);

    assert_eq!(exit_code(&mut child).await, 1);
    let stderr = read_stderr(&mut child).await;
    assert!(stderr.contains("failed to load configuration"), "{stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_config_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.json");
    std::fs::write(&path, "{ not valid json").unwrap();
    let mut child = spawn_bridge(&["--config", path.to_str().unwrap()]);

    assert_eq!(exit_code(&mut child).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sigterm_shuts_down_with_zero() {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let mut child = spawn_bridge(&[
        "--config",
        config.to_str().unwrap(),
        "--",
        "sleep",
        "60",
    ]);

    // Wait past the start-up grace so the bridge is running.
    tokio::time::sleep(Duration::from_millis(800)).await;
    let pid = child.id().unwrap();
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).unwrap();

    assert_eq!(exit_code(&mut child).await, 0);
    assert_eq!(
        activity_events(dir.path()).last().map(String::as_str),
        Some("BRIDGE_SHUTDOWN")
    );
}
