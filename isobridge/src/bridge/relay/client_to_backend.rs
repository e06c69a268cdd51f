//! Client → Backend pump: read client stdin, rewrite paths, write backend stdin.

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use isobridge_core::paths::rewrite_paths;

use crate::bridge::lifecycle::StreamDirection;
use crate::bridge::supervisor::BackendControl;
use crate::error::BridgeError;

use super::helpers::{PumpEnd, RelayContext, display_line, next_line, write_line};

/// A client line ready to be written to the backend.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PreparedLine<'a> {
    pub bytes: Cow<'a, [u8]>,
    /// `false` when the line was not JSON and is forwarded verbatim.
    pub decoded: bool,
    pub translated: usize,
}

/// Decode, rewrite and re-encode one client line.
///
/// A line that is not UTF-8, is blank, or does not parse as JSON is
/// returned borrowed and unchanged.
pub(crate) fn prepare_line(raw: &[u8], translate_paths: bool) -> PreparedLine<'_> {
    let passthrough = PreparedLine {
        bytes: Cow::Borrowed(raw),
        decoded: false,
        translated: 0,
    };

    let Some(value) = std::str::from_utf8(raw)
        .ok()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
    else {
        return passthrough;
    };

    let (value, translated) = rewrite_paths(value, translate_paths);
    match serde_json::to_vec(&value) {
        Ok(mut encoded) => {
            encoded.push(b'\n');
            PreparedLine {
                bytes: Cow::Owned(encoded),
                decoded: true,
                translated,
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "re-encoding failed, forwarding raw line");
            passthrough
        }
    }
}

/// Read from client stdin, forward to backend stdin.
///
/// Returns when the client closes its input, when the token is cancelled,
/// when the backend is found dead, or when a write fails. Returning drops
/// `backend_in`, which closes the backend's stdin.
pub async fn client_to_backend<R, W>(
    ctx: RelayContext,
    translate_paths: bool,
    mut reader: R,
    mut backend_in: W,
    backend: Arc<dyn BackendControl>,
    cancel: CancellationToken,
) -> Result<PumpEnd, BridgeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session_id = &*ctx.session_id;
    let direction = StreamDirection::ClientToBackend;
    let mut raw_buf = Vec::new();

    loop {
        let bytes_read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(session_id, "client→backend: cancelled");
                return Ok(PumpEnd::Cancelled);
            }
            result = next_line(&ctx, &mut reader, &mut raw_buf, direction) => result?,
        };

        if bytes_read == 0 {
            tracing::debug!(session_id, "client stdin EOF");
            return Ok(PumpEnd::Eof);
        }

        if !backend.is_alive() {
            ctx.stats.record_dropped_dead_backend();
            tracing::debug!(
                session_id,
                len = bytes_read,
                "client→backend: backend not alive, line dropped"
            );
            return Ok(PumpEnd::BackendGone);
        }

        let prepared = prepare_line(&raw_buf, translate_paths);
        if prepared.decoded {
            ctx.stats.record_paths_translated(prepared.translated);
            if prepared.translated > 0 {
                tracing::debug!(
                    session_id,
                    original = %display_line(&raw_buf),
                    rewritten = %display_line(&prepared.bytes),
                    "client→backend: rewrote paths"
                );
            }
        } else {
            ctx.stats.record_raw_passthrough();
            tracing::debug!(session_id, "client→backend: not JSON, forwarding raw line");
        }
        tracing::debug!(session_id, line = %display_line(&prepared.bytes), ">>> client");

        if let Err(e) = write_line(&mut backend_in, &prepared.bytes).await {
            tracing::warn!(session_id, error = %e, "client→backend: write to backend failed");
            return Ok(PumpEnd::WriteFailed(e.kind()));
        }
        ctx.stats.record_client_to_backend();
    }
}
