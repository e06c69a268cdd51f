//! Diagnostic pump: backend stderr lines go to the bridge's own log, never
//! to the client.

use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use crate::bridge::lifecycle::StreamDirection;
use crate::error::BridgeError;

use super::helpers::{PumpEnd, RelayContext, display_line, next_line};

pub async fn diagnostics<R>(
    ctx: RelayContext,
    mut reader: R,
    drain: CancellationToken,
) -> Result<PumpEnd, BridgeError>
where
    R: AsyncBufRead + Unpin,
{
    let session_id = &*ctx.session_id;
    let direction = StreamDirection::Diagnostic;
    let mut raw_buf = Vec::new();

    loop {
        let bytes_read = tokio::select! {
            biased;
            _ = drain.cancelled() => return Ok(PumpEnd::Cancelled),
            result = next_line(&ctx, &mut reader, &mut raw_buf, direction) => result?,
        };

        if bytes_read == 0 {
            tracing::debug!(session_id, "backend stderr EOF");
            return Ok(PumpEnd::Eof);
        }

        let line = display_line(&raw_buf);
        if line.trim().is_empty() {
            continue;
        }
        ctx.stats.record_diagnostic_line();
        tracing::info!(target: "isobridge::backend", session_id, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::io::BufReader;

    use isobridge_core::stats::RelayStats;

    #[tokio::test]
    async fn test_counts_non_blank_lines() {
        let ctx = RelayContext {
            session_id: Arc::from("test"),
            stats: Arc::new(RelayStats::new()),
            max_line_bytes: 1024,
        };
        let input = b"INFO starting\n\nWARN slow\r\n   \n";
        let end = diagnostics(
            ctx.clone(),
            BufReader::new(&input[..]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(end, PumpEnd::Eof);
        assert_eq!(ctx.stats.snapshot().diagnostic_lines, 2);
    }
}
