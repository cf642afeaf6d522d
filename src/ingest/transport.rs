//! Line-oriented transports feeding the ingestor.

use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;

/// Longest line a transport will buffer before handing it on unterminated.
///
/// Telemetry records are under 200 bytes; anything past this is line noise or a
/// stream with no line breaks at all.
pub const MAX_LINE_LEN: usize = 4096;

/// A source of text lines.
///
/// `next_line` returns `Ok(None)` once the stream has ended; an `Err` is a transport
/// failure and also ends ingestion. Implementations must be cancel-safe at the
/// granularity of a whole line: dropping a pending `next_line` may lose at most the
/// bytes of that call.
#[async_trait]
pub trait LineTransport: Send {
    /// Waits for the next complete line, without its terminator.
    async fn next_line(&mut self) -> AppResult<Option<String>>;

    /// Releases the underlying resource.
    async fn close(&mut self) -> AppResult<()> {
        Ok(())
    }

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

#[async_trait]
impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    async fn next_line(&mut self) -> AppResult<Option<String>> {
        (**self).next_line().await
    }

    async fn close(&mut self) -> AppResult<()> {
        (**self).close().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Splits a byte stream into lines on `\n`, dropping a trailing `\r`.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, so a corrupted
/// byte costs at most one line (which will then fail to parse). A run of more than
/// `max_line_len` bytes without a break is cut and emitted as its own line.
#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    ready: VecDeque<String>,
    max_line_len: usize,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }
}

impl LineSplitter {
    /// Creates an empty splitter capped at [`MAX_LINE_LEN`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty splitter with a custom line cap (at least one byte).
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            ready: VecDeque::new(),
            max_line_len: max_line_len.max(1),
        }
    }

    /// Appends raw bytes, completing any lines they terminate.
    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                let line = std::mem::take(&mut self.pending);
                self.ready.push_back(decode_line(&line));
                continue;
            }
            if self.pending.len() >= self.max_line_len {
                warn!(
                    max_line_len = self.max_line_len,
                    "line exceeds limit without a break, cutting it"
                );
                let line = std::mem::take(&mut self.pending);
                self.ready.push_back(decode_line(&line));
            }
            self.pending.push(b);
        }
    }

    /// Next completed line, if any.
    pub fn pop(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Flushes an unterminated final line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if let Some(line) = self.ready.pop_front() {
            return Some(line);
        }
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(decode_line(&line))
    }

    /// Bytes received since the last line break.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Lines from any buffered async reader: log files, stdin, in-memory buffers.
///
/// Lines longer than [`MAX_LINE_LEN`] are returned in pieces of at most that size.
pub struct ReaderTransport<R> {
    reader: R,
    label: String,
    buf: Vec<u8>,
    max_line_len: usize,
}

impl<R> ReaderTransport<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Wraps `reader`; `label` names the source in logs.
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        Self {
            reader,
            label: label.into(),
            buf: Vec::with_capacity(256),
            max_line_len: MAX_LINE_LEN,
        }
    }

    /// Overrides the line cap (at least one byte).
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len.max(1);
        self
    }
}

impl ReaderTransport<BufReader<tokio::fs::File>> {
    /// Opens a captured log for replay.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl ReaderTransport<BufReader<tokio::io::Stdin>> {
    /// Reads lines piped into the process.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

#[async_trait]
impl<R> LineTransport for ReaderTransport<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> AppResult<Option<String>> {
        self.buf.clear();
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(decode_line(&self.buf)));
            }

            // one byte past the room so a break right at the cap still ends the line
            let room = self.max_line_len - self.buf.len();
            let window = &available[..available.len().min(room + 1)];
            if let Some(pos) = window.iter().position(|&b| b == b'\n') {
                self.buf.extend_from_slice(&window[..pos]);
                self.reader.consume(pos + 1);
                return Ok(Some(decode_line(&self.buf)));
            }

            let taken = window.len().min(room);
            self.buf.extend_from_slice(&window[..taken]);
            self.reader.consume(taken);
            if self.buf.len() >= self.max_line_len {
                warn!(
                    source = %self.label,
                    max_line_len = self.max_line_len,
                    "line exceeds limit without a break, cutting it"
                );
                return Ok(Some(decode_line(&self.buf)));
            }
        }
    }

    fn describe(&self) -> String {
        format!("reader({})", self.label)
    }
}
