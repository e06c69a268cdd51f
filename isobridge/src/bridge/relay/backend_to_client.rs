//! Backend → Client pump: read backend stdout, forward to client stdout.
//!
//! Lines are never decoded in this direction. Each one is written verbatim
//! and flushed immediately.

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::bridge::lifecycle::StreamDirection;
use crate::error::BridgeError;

use super::helpers::{PumpEnd, RelayContext, display_line, next_line, write_line};

/// Read from backend stdout, forward to client stdout.
///
/// This pump is the only writer of client stdout. It keeps running through
/// the backend's termination so output already emitted is delivered, and
/// stops at end of stream or when `drain` is cancelled.
pub async fn backend_to_client<R, W>(
    ctx: RelayContext,
    mut reader: R,
    mut client_out: W,
    drain: CancellationToken,
) -> Result<PumpEnd, BridgeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session_id = &*ctx.session_id;
    let direction = StreamDirection::BackendToClient;
    let mut raw_buf = Vec::new();

    loop {
        let bytes_read = tokio::select! {
            biased;
            _ = drain.cancelled() => {
                tracing::debug!(session_id, "backend→client: cancelled");
                return Ok(PumpEnd::Cancelled);
            }
            result = next_line(&ctx, &mut reader, &mut raw_buf, direction) => result?,
        };

        if bytes_read == 0 {
            tracing::debug!(session_id, "backend stdout EOF");
            return Ok(PumpEnd::Eof);
        }

        tracing::debug!(session_id, line = %display_line(&raw_buf), "<<< backend");

        if let Err(e) = write_line(&mut client_out, &raw_buf).await {
            tracing::warn!(session_id, error = %e, "backend→client: write to client failed");
            return Ok(PumpEnd::WriteFailed(e.kind()));
        }
        ctx.stats.record_backend_to_client();
    }
}
