//! Relays one output stream of the wrapped command in real time.
//!
//! Every chunk read from the child is written to the real output and flushed
//! before the next read, so interactive prompts without a trailing newline
//! show up immediately. When capture is enabled the same bytes are assembled
//! into line records and pushed into a [`RingBuffer`].

use crate::core::StreamName;
use crate::runtime::ring_buffer::RingBuffer;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::debug;

/// Size of a single read from the child
pub const READ_CHUNK: usize = 8 * 1024;

/// A line longer than this is committed as a fragment
pub const MAX_PENDING_LINE: usize = 64 * 1024;

/// What a pump observed on its stream
#[derive(Debug)]
pub struct CapturedStream {
    pub name: StreamName,
    /// Retained lines, `None` when capture was disabled
    pub buffer: Option<RingBuffer>,
    /// Bytes read from the child
    pub bytes: u64,
    /// Line records seen, including evicted ones
    pub lines: u64,
    /// The stream ended on an error instead of end-of-file
    pub partial: bool,
}

impl CapturedStream {
    fn new(name: StreamName, buffer: Option<RingBuffer>) -> Self {
        Self {
            name,
            buffer,
            bytes: 0,
            lines: 0,
            partial: false,
        }
    }

    /// True if the ring buffer had to drop lines
    pub fn evicted_lines(&self) -> bool {
        self.buffer.as_ref().map_or(false, |b| b.evicted() > 0)
    }
}

/// Drains `reader` into `writer` until end-of-stream
pub struct StreamPump<R, W> {
    name: StreamName,
    reader: R,
    writer: W,
    buffer: Option<RingBuffer>,
}

impl<R, W> StreamPump<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(name: StreamName, reader: R, writer: W) -> Self {
        Self {
            name,
            reader,
            writer,
            buffer: None,
        }
    }

    /// Keep the last `max_lines` lines for analysis
    pub fn capture(mut self, max_lines: usize) -> Self {
        self.buffer = Some(RingBuffer::new(max_lines));
        self
    }

    /// Run to end-of-stream and hand back the observations and the writer.
    ///
    /// Read and write errors end the loop and mark the capture as partial;
    /// they are never returned. Dropping the reader on a write error closes
    /// the pipe, so the child sees the same broken pipe it would have seen
    /// running unwrapped.
    pub async fn run(self) -> (CapturedStream, W) {
        let Self {
            name,
            mut reader,
            mut writer,
            buffer,
        } = self;

        let mut captured = CapturedStream::new(name, buffer);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut pending = BytesMut::new();

        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(stream = %name, error = %e, "read failed, capture is partial");
                    captured.partial = true;
                    break;
                }
            };
            let data = &chunk[..n];
            captured.bytes += n as u64;

            let echoed = match writer.write_all(data).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = echoed {
                debug!(stream = %name, error = %e, "write failed, capture is partial");
                captured.partial = true;
                break;
            }

            match captured.buffer.as_mut() {
                Some(buffer) => {
                    captured.lines += assemble_lines(data, &mut pending, buffer);
                }
                None => {
                    captured.lines += data.iter().filter(|b| **b == b'\n').count() as u64;
                }
            }
        }

        if let Some(buffer) = captured.buffer.as_mut() {
            if !pending.is_empty() {
                commit_line(&mut pending, buffer);
                captured.lines += 1;
            }
        }
        let _ = writer.flush().await;

        debug!(
            stream = %name,
            bytes = captured.bytes,
            lines = captured.lines,
            partial = captured.partial,
            "stream closed"
        );
        (captured, writer)
    }
}

impl<R, W> StreamPump<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Run on the tokio runtime
    pub fn spawn(self) -> JoinHandle<(CapturedStream, W)> {
        tokio::spawn(self.run())
    }
}

/// Split `data` on newlines, committing each complete line. Returns the
/// number of lines committed.
fn assemble_lines(data: &[u8], pending: &mut BytesMut, buffer: &mut RingBuffer) -> u64 {
    let mut committed = 0;
    let mut rest = data;
    while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
        pending.extend_from_slice(&rest[..=pos]);
        commit_line(pending, buffer);
        committed += 1;
        rest = &rest[pos + 1..];
    }
    pending.extend_from_slice(rest);
    if pending.len() >= MAX_PENDING_LINE {
        // An incomplete trailing character stays pending for the next chunk
        let cut = match char_boundary(pending) {
            0 => pending.len(),
            cut => cut,
        };
        let fragment = pending.split_to(cut);
        buffer.push(String::from_utf8_lossy(&fragment).into_owned());
        committed += 1;
    }
    committed
}

/// Length of `bytes` without a UTF-8 sequence cut off at its end
fn char_boundary(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { len - back } else { len };
    }
    len
}

fn commit_line(pending: &mut BytesMut, buffer: &mut RingBuffer) {
    let line = pending.split();
    buffer.push(String::from_utf8_lossy(&line).into_owned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Reader that yields its chunks one read at a time
    struct ScriptedReader {
        chunks: Vec<Vec<u8>>,
    }

    impl AsyncRead for ScriptedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.chunks.is_empty() {
                return Poll::Ready(Ok(()));
            }
            let chunk = self.chunks.remove(0);
            buf.put_slice(&chunk);
            Poll::Ready(Ok(()))
        }
    }

    /// Writer that accepts `budget` writes and then reports a broken pipe
    struct ClosingWriter {
        written: Vec<u8>,
        budget: usize,
    }

    impl AsyncWrite for ClosingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.budget == 0 {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")));
            }
            self.budget -= 1;
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn scripted(chunks: &[&str]) -> ScriptedReader {
        ScriptedReader {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
        }
    }

    #[tokio::test]
    async fn test_echo_is_byte_identical() {
        let input = "alpha\nbeta\n\u{1F980} gamma";
        let pump = StreamPump::new(StreamName::Stdout, input.as_bytes(), Vec::new()).capture(10);
        let (captured, written) = pump.run().await;

        assert_eq!(written, input.as_bytes());
        assert_eq!(captured.bytes, input.len() as u64);
        assert_eq!(captured.lines, 3);
        assert!(!captured.partial);
        let buffer = captured.buffer.unwrap();
        assert_eq!(buffer.snapshot(), vec!["alpha\n", "beta\n", "\u{1F980} gamma"]);
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks_are_reassembled() {
        let reader = tokio_test::io::Builder::new()
            .read(b"hel")
            .read(b"lo\nwor")
            .read(b"ld\n")
            .read(b"tail")
            .build();
        let (captured, written) = StreamPump::new(StreamName::Stdout, reader, Vec::new())
            .capture(10)
            .run()
            .await;

        assert_eq!(written, b"hello\nworld\ntail");
        assert_eq!(
            captured.buffer.unwrap().snapshot(),
            vec!["hello\n", "world\n", "tail"]
        );
    }

    #[tokio::test]
    async fn test_without_capture_nothing_is_buffered() {
        let (captured, written) =
            StreamPump::new(StreamName::Stderr, &b"one\ntwo\n"[..], Vec::new())
                .run()
                .await;
        assert!(captured.buffer.is_none());
        assert_eq!(captured.lines, 2);
        assert_eq!(written, b"one\ntwo\n");
        assert!(!captured.evicted_lines());
    }

    #[tokio::test]
    async fn test_capacity_bounds_retained_lines() {
        let input: String = (0..100).map(|i| format!("{i}\n")).collect();
        let (captured, written) =
            StreamPump::new(StreamName::Stdout, input.as_bytes(), Vec::new())
                .capture(5)
                .run()
                .await;

        assert_eq!(written, input.as_bytes());
        assert_eq!(captured.lines, 100);
        assert!(captured.evicted_lines());
        assert_eq!(
            captured.buffer.unwrap().snapshot(),
            vec!["95\n", "96\n", "97\n", "98\n", "99\n"]
        );
    }

    #[tokio::test]
    async fn test_read_error_is_swallowed_as_partial() {
        let reader = tokio_test::io::Builder::new()
            .read(b"ok\n")
            .read_error(io::Error::new(io::ErrorKind::Other, "boom"))
            .build();
        let (captured, written) = StreamPump::new(StreamName::Stdout, reader, Vec::new())
            .capture(10)
            .run()
            .await;

        assert!(captured.partial);
        assert_eq!(written, b"ok\n");
        assert_eq!(captured.buffer.unwrap().snapshot(), vec!["ok\n"]);
    }

    #[tokio::test]
    async fn test_write_error_stops_pump() {
        let reader = scripted(&["first\n", "second\n", "third\n"]);
        let writer = ClosingWriter {
            written: Vec::new(),
            budget: 1,
        };
        let (captured, writer) = StreamPump::new(StreamName::Stdout, reader, writer)
            .capture(10)
            .run()
            .await;

        assert!(captured.partial);
        assert_eq!(writer.written, b"first\n");
    }

    #[tokio::test]
    async fn test_overlong_line_is_committed_as_fragment() {
        let long = "x".repeat(MAX_PENDING_LINE + 10);
        let (captured, _) = StreamPump::new(StreamName::Stdout, long.as_bytes(), tokio::io::sink())
            .capture(10)
            .run()
            .await;

        let buffer = captured.buffer.unwrap();
        let total: usize = buffer.snapshot().iter().map(|l| l.len()).sum();
        assert_eq!(total, long.len());
        assert!(buffer.len() >= 2);
    }

    #[tokio::test]
    async fn test_overlong_line_splits_on_char_boundary() {
        // One ASCII byte first so the byte limit falls inside a two-byte character
        let long = format!("x{}", "é".repeat(MAX_PENDING_LINE));
        let (captured, _) = StreamPump::new(StreamName::Stdout, long.as_bytes(), tokio::io::sink())
            .capture(10)
            .run()
            .await;

        let buffer = captured.buffer.unwrap();
        let lines = buffer.snapshot();
        assert!(lines.len() >= 2);
        assert!(lines.iter().all(|l| !l.contains('\u{FFFD}')));
        assert_eq!(lines.concat(), long);
    }

    #[test]
    fn test_char_boundary() {
        assert_eq!(char_boundary(b"abc"), 3);
        assert_eq!(char_boundary("aé".as_bytes()), 3);
        assert_eq!(char_boundary(&"aé".as_bytes()[..2]), 1);
        assert_eq!(char_boundary(&"a\u{1F980}".as_bytes()[..4]), 1);
        assert_eq!(char_boundary("a\u{1F980}".as_bytes()), 5);
        assert_eq!(char_boundary(b""), 0);
    }
}
