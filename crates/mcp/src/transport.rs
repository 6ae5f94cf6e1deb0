//! MCP transport layer.
//!
//! A transport splits into a [`MessageReader`] and a [`MessageWriter`] so the
//! server can keep reading requests while earlier tool calls are still
//! producing responses. Messages are newline-delimited JSON.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::McpError;

/// Receiving half of a transport.
#[async_trait]
pub trait MessageReader: Send {
    /// Read the next JSON-RPC message line from the transport.
    /// Returns `None` when the transport is closed. After
    /// [`McpError::InvalidUtf8`] the reader can still be polled.
    async fn receive(&mut self) -> Result<Option<String>, McpError>;
}

/// Sending half of a transport.
#[async_trait]
pub trait MessageWriter: Send {
    /// Write a JSON-RPC message line to the transport.
    async fn send(&mut self, message: &str) -> Result<(), McpError>;
}

/// A bidirectional message channel that can be split into halves.
pub trait McpTransport {
    type Reader: MessageReader + 'static;
    type Writer: MessageWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

// ── Line framing over async byte streams ────────────────────────────

/// Reads newline-delimited messages, skipping blank lines.
pub struct LineReader<R> {
    inner: R,
}

impl<R> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageReader for LineReader<R> {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        loop {
            let mut buf = Vec::new();
            if self.inner.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(None); // EOF
            }
            // The bad line is already consumed, so the next read resumes after it.
            let line = String::from_utf8(buf)?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

/// Writes one message per line, flushing after each.
pub struct LineWriter<W> {
    inner: W,
}

impl<W> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageWriter for LineWriter<W> {
    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        self.inner.write_all(message.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        Ok(())
    }
}

// ── Stdio ───────────────────────────────────────────────────────────

/// Stdio-based transport: requests on stdin, responses on stdout.
///
/// Stdout carries protocol frames only; logs belong on stderr.
pub struct StdioTransport {
    stdin: tokio::io::Stdin,
    stdout: tokio::io::Stdout,
}

impl StdioTransport {
    /// Create a new stdio transport.
    pub fn new() -> Self {
        Self {
            stdin: tokio::io::stdin(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl McpTransport for StdioTransport {
    type Reader = LineReader<BufReader<tokio::io::Stdin>>;
    type Writer = LineWriter<tokio::io::Stdout>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            LineReader::new(BufReader::new(self.stdin)),
            LineWriter::new(self.stdout),
        )
    }
}

// ── In-memory channels ──────────────────────────────────────────────

/// In-memory transport for testing, backed by channel pairs.
pub struct ChannelTransport {
    rx: mpsc::Receiver<String>,
    tx: mpsc::Sender<String>,
}

impl ChannelTransport {
    /// Create a pair of connected transports for testing.
    ///
    /// Messages sent on one transport are received by the other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel(32);
        let (tx_b, rx_a) = mpsc::channel(32);
        (Self { rx: rx_a, tx: tx_a }, Self { rx: rx_b, tx: tx_b })
    }
}

pub struct ChannelReader(mpsc::Receiver<String>);

pub struct ChannelWriter(mpsc::Sender<String>);

impl McpTransport for ChannelTransport {
    type Reader = ChannelReader;
    type Writer = ChannelWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (ChannelReader(self.rx), ChannelWriter(self.tx))
    }
}

#[async_trait]
impl MessageReader for ChannelReader {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        Ok(self.0.recv().await)
    }
}

#[async_trait]
impl MessageWriter for ChannelWriter {
    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        self.0
            .send(message.to_string())
            .await
            .map_err(|e| McpError::Transport(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e)))
    }
}
