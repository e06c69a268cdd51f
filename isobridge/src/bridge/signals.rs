//! Termination signal listener.

use crate::error::BridgeError;

/// SIGTERM and SIGINT on Unix, Ctrl-C elsewhere.
///
/// Installed once at session start. Once installed, the signals no longer
/// kill the process, so a second signal during teardown is a no-op.
pub struct TerminationSignals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    pub fn install() -> Result<Self, BridgeError> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self {
                sigterm: signal(SignalKind::terminate()).map_err(BridgeError::Signal)?,
                sigint: signal(SignalKind::interrupt()).map_err(BridgeError::Signal)?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next termination request and return its name.
    pub async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.sigterm.recv() => "SIGTERM",
                _ = self.sigint.recv() => "SIGINT",
            }
        }
        #[cfg(not(unix))]
        {
            match tokio::signal::ctrl_c().await {
                Ok(()) => "CTRL_C",
                Err(e) => {
                    tracing::warn!(error = %e, "ctrl-c listener failed");
                    std::future::pending().await
                }
            }
        }
    }
}
