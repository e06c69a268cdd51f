//! Backend process supervision.
//!
//! [`ProcessSupervisor::start`] spawns the backend with three piped streams,
//! waits the start-up grace period and checks liveness once. After that a
//! single exit-watcher task owns the `Child`: it is the only place that waits
//! on the process, and it publishes the exit on a `watch` channel. Every
//! [`BackendHandle`] clone reads liveness from that channel, and forced kills
//! are routed back to the watcher so the process is never waited on twice.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};

use isobridge_core::config::ServerEntry;
use isobridge_core::paths::translate_command;

use crate::error::BridgeError;

use super::lifecycle::BackendExit;

/// Most diagnostic bytes kept from a backend that failed to start.
const START_DIAGNOSTIC_LIMIT: u64 = 64 * 1024;

/// How long to wait for a dead backend's diagnostic stream to reach EOF.
const START_DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(1);

// ─────────────────────────────────────────────────────────────────────────────
// Backend Spec
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to launch the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Overlay onto the inherited environment; overlay wins.
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl BackendSpec {
    /// Build the launch spec for a configured server.
    ///
    /// With `translate` set, a `/mnt/<drive>/...` command is launched through
    /// `cmd.exe`.
    pub fn from_server(entry: &ServerEntry, translate: bool) -> Self {
        let (command, args) = if translate {
            translate_command(&entry.command, &entry.args)
        } else {
            (entry.command.clone(), entry.args.clone())
        };
        Self {
            name: entry.name.clone(),
            command,
            args,
            env: entry.env.clone(),
            cwd: entry.cwd.clone(),
        }
    }

    /// Replace command and arguments, keeping name, environment and cwd.
    ///
    /// An empty `command_line` leaves the spec unchanged.
    pub fn with_command_line(mut self, command_line: &[String]) -> Self {
        if let Some((command, args)) = command_line.split_first() {
            self.command = command.clone();
            self.args = args.to_vec();
        }
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Control
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness and termination of a running backend.
///
/// Pumps only read liveness. Termination is invoked by the controller alone.
#[async_trait]
pub trait BackendControl: Send + Sync {
    fn pid(&self) -> Option<u32>;

    /// Non-blocking check; `true` until the exit has been observed.
    fn is_alive(&self) -> bool;

    /// The exit, once observed.
    fn exit_status(&self) -> Option<BackendExit>;

    /// Wait until the backend has exited.
    async fn wait_exit(&self) -> BackendExit;

    /// Graceful termination request, then a forced kill after `grace`.
    ///
    /// Returns only once the exit is confirmed. On an already-exited backend
    /// this does nothing and returns the recorded exit.
    async fn terminate(&self, grace: Duration) -> BackendExit;
}

/// Handle to a backend owned by its exit-watcher task.
#[derive(Debug, Clone)]
pub struct BackendHandle {
    pid: Option<u32>,
    status: watch::Receiver<Option<BackendExit>>,
    kill_tx: mpsc::Sender<()>,
}

impl BackendHandle {
    /// Send `signal` to the backend's process group.
    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) -> bool {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return false;
        };
        match killpg(Pid::from_raw(pid as i32), signal) {
            Ok(()) => {
                tracing::info!(pid, ?signal, "signalled backend process group");
                true
            }
            Err(e) => {
                tracing::debug!(pid, ?signal, error = ?e, "killpg failed");
                false
            }
        }
    }

    async fn force_kill(&self) {
        tracing::warn!(pid = self.pid, "force-killing backend");
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGKILL);
        // The watcher also kills the direct child, covering platforms
        // without process groups.
        let _ = self.kill_tx.send(()).await;
    }
}

#[async_trait]
impl BackendControl for BackendHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&self) -> bool {
        self.status.borrow().is_none()
    }

    fn exit_status(&self) -> Option<BackendExit> {
        *self.status.borrow()
    }

    async fn wait_exit(&self) -> BackendExit {
        let mut rx = self.status.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(status) => (*status).unwrap_or(BackendExit::Unknown),
            Err(_) => (*self.status.borrow()).unwrap_or(BackendExit::Unknown),
        }
    }

    async fn terminate(&self, grace: Duration) -> BackendExit {
        if let Some(exit) = self.exit_status() {
            tracing::debug!(pid = self.pid, %exit, "terminate: backend already exited");
            return exit;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;
            if !grace.is_zero() && self.signal_group(Signal::SIGTERM) {
                match tokio::time::timeout(grace, self.wait_exit()).await {
                    Ok(exit) => {
                        tracing::info!(pid = self.pid, %exit, "backend exited after SIGTERM");
                        return exit;
                    }
                    Err(_) => {
                        tracing::warn!(
                            pid = self.pid,
                            grace_ms = grace.as_millis() as u64,
                            "backend did not exit within terminate_grace"
                        );
                    }
                }
            }
        }
        #[cfg(not(unix))]
        let _ = grace;

        self.force_kill().await;
        let exit = self.wait_exit().await;
        tracing::info!(pid = self.pid, %exit, "backend exited after forced kill");
        exit
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Process Supervisor
// ─────────────────────────────────────────────────────────────────────────────

/// A started backend: its handle plus the three pipe ends.
#[derive(Debug)]
pub struct Backend {
    pub handle: BackendHandle,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Starts backends.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    startup_grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(startup_grace: Duration) -> Self {
        Self { startup_grace }
    }

    /// Spawn the backend and confirm it survives the start-up grace period.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Spawn`] when the process cannot be created,
    /// [`BridgeError::StartFailure`] when it exits during the grace period.
    pub async fn start(&self, spec: &BackendSpec) -> Result<Backend, BridgeError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref cwd) = spec.cwd {
            cmd.current_dir(cwd);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| BridgeError::Spawn {
            command: spec.command.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id();
        tracing::info!(
            server = %spec.name,
            pid,
            command = %spec.command,
            args = ?spec.args,
            "backend process spawned"
        );

        let stdin = child
            .stdin
            .take()
            .ok_or(BridgeError::PipeUnavailable { stream: "stdin" })?;
        let stdout = child
            .stdout
            .take()
            .ok_or(BridgeError::PipeUnavailable { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(BridgeError::PipeUnavailable { stream: "stderr" })?;

        tokio::time::sleep(self.startup_grace).await;

        if let Some(status) = child.try_wait()? {
            let exit = BackendExit::from_status(status);
            let diagnostic = read_start_diagnostic(stderr).await;
            tracing::error!(
                server = %spec.name,
                pid,
                %exit,
                diagnostic = %diagnostic,
                "backend exited during start-up"
            );
            let exit_code = match exit {
                BackendExit::Exited { code } => code,
                _ => -1,
            };
            return Err(BridgeError::StartFailure {
                exit_code,
                diagnostic,
            });
        }

        let (status_tx, status_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = mpsc::channel(1);
        tokio::spawn(watch_exit(child, kill_rx, status_tx));

        Ok(Backend {
            handle: BackendHandle {
                pid,
                status: status_rx,
                kill_tx,
            },
            stdin,
            stdout,
            stderr,
        })
    }
}

/// Own the child until it exits, applying kill requests as they arrive.
async fn watch_exit(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<()>,
    status_tx: watch::Sender<Option<BackendExit>>,
) {
    let pid = child.id();
    let exit = loop {
        tokio::select! {
            status = child.wait() => {
                break match status {
                    Ok(status) => BackendExit::from_status(status),
                    Err(e) => {
                        tracing::error!(pid, error = %e, "failed to wait on backend process");
                        BackendExit::Unknown
                    }
                };
            }
            Some(()) = kill_rx.recv() => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(pid, error = %e, "kill failed");
                }
            }
        }
    };
    tracing::info!(pid, %exit, "backend process exited");
    status_tx.send_replace(Some(exit));
}

async fn read_start_diagnostic(stderr: ChildStderr) -> String {
    let mut buf = Vec::new();
    let mut limited = stderr.take(START_DIAGNOSTIC_LIMIT);
    if tokio::time::timeout(START_DIAGNOSTIC_TIMEOUT, limited.read_to_end(&mut buf))
        .await
        .is_err()
    {
        tracing::debug!("timed out reading backend diagnostic output");
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(command: &str, args: &[&str]) -> ServerEntry {
        ServerEntry {
            name: "test".to_string(),
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: HashMap::from([("K".to_string(), "V".to_string())]),
            cwd: Some(PathBuf::from("/tmp")),
        }
    }

    #[test]
    fn test_spec_from_server_plain() {
        let spec = BackendSpec::from_server(&entry("/mnt/c/srv.exe", &["-x"]), false);
        assert_eq!(spec.command, "/mnt/c/srv.exe");
        assert_eq!(spec.args, vec!["-x"]);
        assert_eq!(spec.env.get("K").map(String::as_str), Some("V"));
    }

    #[test]
    fn test_spec_from_server_translated() {
        let spec = BackendSpec::from_server(&entry("/mnt/c/srv.exe", &["-x"]), true);
        assert_eq!(spec.command, "cmd.exe");
        assert_eq!(spec.args, vec!["/c", r"C:\srv.exe", "-x"]);
    }

    #[test]
    fn test_spec_command_line_override() {
        let spec = BackendSpec::from_server(&entry("python", &["-m", "x"]), false)
            .with_command_line(&["cat".to_string(), "-u".to_string()]);
        assert_eq!(spec.command, "cat");
        assert_eq!(spec.args, vec!["-u"]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));

        let unchanged = spec.clone().with_command_line(&[]);
        assert_eq!(unchanged, spec);
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let spec = BackendSpec::from_server(
            &entry("/definitely/not/a/real/binary", &[]),
            false,
        );
        let err = ProcessSupervisor::new(Duration::from_millis(10))
            .start(&spec)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Spawn { .. }));
    }
}
