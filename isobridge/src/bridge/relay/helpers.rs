//! Shared pump types and size-bounded line I/O.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use isobridge_core::stats::RelayStats;

use crate::bridge::lifecycle::StreamDirection;
use crate::error::{BridgeError, FramingError};

/// State every pump needs.
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub session_id: Arc<str>,
    pub stats: Arc<RelayStats>,
    pub max_line_bytes: usize,
}

/// Why a pump returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEnd {
    /// Source reached end of stream.
    Eof,
    /// The pump's cancellation token fired.
    Cancelled,
    /// The backend was observed dead; the pending line was dropped.
    BackendGone,
    /// Writing to the destination failed.
    WriteFailed(std::io::ErrorKind),
}

// ─────────────────────────────────────────────────────────────────────────────
// Line Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Read the next line that fits within `ctx.max_line_bytes` into `buf`.
///
/// `buf` is cleared first. Oversized lines are skipped here, each one
/// counted and logged against `direction`, so callers only ever see lines
/// they can forward. `Ok(0)` means end of stream.
pub async fn next_line<R: AsyncBufRead + Unpin>(
    ctx: &RelayContext,
    reader: &mut R,
    buf: &mut Vec<u8>,
    direction: StreamDirection,
) -> Result<usize, BridgeError> {
    loop {
        buf.clear();
        match bounded_read_line(reader, buf, ctx.max_line_bytes).await {
            Ok(n) => return Ok(n),
            Err(FramingError::MessageTooLarge { max_bytes }) => {
                ctx.stats.record_oversized();
                tracing::warn!(
                    session_id = &*ctx.session_id,
                    %direction,
                    max_bytes,
                    "line exceeded size limit, dropped"
                );
            }
            Err(source) => return Err(BridgeError::Framing { direction, source }),
        }
    }
}

/// Append one newline-terminated line to `buf`, holding at most
/// `max_bytes` of it.
///
/// The newline is kept. At end of stream a trailing partial line is
/// returned as is; `Ok(0)` means nothing was left.
///
/// # Errors
///
/// [`FramingError::MessageTooLarge`] when the line is longer than
/// `max_bytes`. The whole line, up to and including its newline, has been
/// consumed by then and nothing of it is left in `buf`.
pub async fn bounded_read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<usize, FramingError> {
    let start = buf.len();
    // Once set, the rest of the line is consumed without being kept.
    let mut overflow = false;

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }

        let newline = chunk.iter().position(|&b| b == b'\n');
        let take = newline.map_or(chunk.len(), |pos| pos + 1);

        if !overflow {
            if buf.len() - start + take > max_bytes {
                overflow = true;
                buf.truncate(start);
            } else {
                buf.extend_from_slice(&chunk[..take]);
            }
        }
        reader.consume(take);

        if newline.is_some() {
            break;
        }
    }

    if overflow {
        Err(FramingError::MessageTooLarge { max_bytes })
    } else {
        Ok(buf.len() - start)
    }
}

/// Write one line and flush it.
pub async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), std::io::Error> {
    writer.write_all(data).await?;
    writer.flush().await
}

/// Lossy, newline-trimmed rendering of a line for logs.
pub fn display_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_reads_lines_in_order() {
        let mut reader = BufReader::new(&b"first\nsecond\n"[..]);
        let mut buf = Vec::new();

        assert_eq!(bounded_read_line(&mut reader, &mut buf, 64).await.unwrap(), 6);
        assert_eq!(buf, b"first\n");

        buf.clear();
        bounded_read_line(&mut reader, &mut buf, 64).await.unwrap();
        assert_eq!(buf, b"second\n");

        buf.clear();
        assert_eq!(bounded_read_line(&mut reader, &mut buf, 64).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_final_line() {
        let mut reader = BufReader::new(&b"tail-without-newline"[..]);
        let mut buf = Vec::new();
        let n = bounded_read_line(&mut reader, &mut buf, 64).await.unwrap();
        assert_eq!(n, 20);
        assert_eq!(buf, b"tail-without-newline");
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let mut data = vec![b'x'; 100];
        data.extend_from_slice(b"\nok\n");
        // The line spans several buffer fills.
        let mut reader = BufReader::with_capacity(16, &data[..]);
        let mut buf = Vec::new();

        let err = bounded_read_line(&mut reader, &mut buf, 32).await.unwrap_err();
        assert!(matches!(err, FramingError::MessageTooLarge { max_bytes: 32 }));

        buf.clear();
        bounded_read_line(&mut reader, &mut buf, 32).await.unwrap();
        assert_eq!(buf, b"ok\n");
    }

    #[tokio::test]
    async fn test_oversized_line_within_one_buffer() {
        let mut reader = BufReader::new(&b"0123456789\nok\n"[..]);
        let mut buf = Vec::new();
        assert!(bounded_read_line(&mut reader, &mut buf, 4).await.is_err());
        assert!(buf.is_empty());
        buf.clear();
        bounded_read_line(&mut reader, &mut buf, 4).await.unwrap();
        assert_eq!(buf, b"ok\n");
    }

    #[tokio::test]
    async fn test_line_exactly_at_limit_fits() {
        let mut reader = BufReader::with_capacity(2, &b"abc\nabcd\n"[..]);
        let mut buf = Vec::new();
        assert_eq!(bounded_read_line(&mut reader, &mut buf, 4).await.unwrap(), 4);
        assert_eq!(buf, b"abc\n");

        buf.clear();
        assert!(bounded_read_line(&mut reader, &mut buf, 4).await.is_err());
        assert_eq!(bounded_read_line(&mut reader, &mut buf, 4).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversized_tail_without_newline() {
        let mut reader = BufReader::with_capacity(4, &[b'x'; 40][..]);
        let mut buf = Vec::new();
        assert!(bounded_read_line(&mut reader, &mut buf, 8).await.is_err());
        assert!(buf.is_empty());
        assert_eq!(bounded_read_line(&mut reader, &mut buf, 8).await.unwrap(), 0);
    }

    /// Reader whose every read fails.
    struct BrokenPipe;

    impl tokio::io::AsyncRead for BrokenPipe {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }
    }

    fn ctx(max_line_bytes: usize) -> RelayContext {
        RelayContext {
            session_id: Arc::from("test"),
            stats: Arc::new(RelayStats::new()),
            max_line_bytes,
        }
    }

    #[tokio::test]
    async fn test_next_line_skips_and_counts_oversized() {
        let ctx = ctx(8);
        let mut data = Vec::new();
        data.extend_from_slice(b"short\n");
        data.extend_from_slice(&[b'a'; 30]);
        data.extend_from_slice(b"\n");
        data.extend_from_slice(&[b'b'; 9]);
        data.extend_from_slice(b"\nlast\n");
        let mut reader = BufReader::with_capacity(4, &data[..]);
        let mut buf = Vec::new();
        let dir = StreamDirection::BackendToClient;

        next_line(&ctx, &mut reader, &mut buf, dir).await.unwrap();
        assert_eq!(buf, b"short\n");
        next_line(&ctx, &mut reader, &mut buf, dir).await.unwrap();
        assert_eq!(buf, b"last\n");
        assert_eq!(next_line(&ctx, &mut reader, &mut buf, dir).await.unwrap(), 0);
        assert_eq!(ctx.stats.snapshot().oversized_dropped, 2);
    }

    #[tokio::test]
    async fn test_next_line_reports_direction_on_io_error() {
        let ctx = ctx(64);
        let mut reader = BufReader::new(BrokenPipe);
        let mut buf = Vec::new();

        let err = next_line(&ctx, &mut reader, &mut buf, StreamDirection::Diagnostic)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Framing {
                direction: StreamDirection::Diagnostic,
                source: FramingError::Io(_),
            }
        ));
    }

    #[test]
    fn test_display_line() {
        assert_eq!(display_line(b"abc\r\n"), "abc");
        assert_eq!(display_line(b"\xffx\n"), "\u{fffd}x");
    }
}
