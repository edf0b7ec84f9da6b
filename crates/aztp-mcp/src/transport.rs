//! Newline-delimited JSON-RPC framing over a duplex byte stream.
//!
//! Each request and response is a single line. Production servers use
//! stdin/stdout; tests plug in `tokio::io::duplex` halves.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tracing::debug;

/// One received frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request(Value),
    /// Line that was not valid JSON; carries the parser message.
    Malformed(String),
}

pub struct StdioTransport<R, W> {
    lines: Lines<R>,
    writer: W,
}

impl StdioTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Transport over the process's standard streams.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Next non-blank frame, or `None` at end of input.
    ///
    /// Cancel safe: dropping the future loses no data.
    pub async fn recv(&mut self) -> std::io::Result<Option<Incoming>> {
        while let Some(line) = self.lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!(len = trimmed.len(), "received frame");
            return Ok(Some(match serde_json::from_str(trimmed) {
                Ok(value) => Incoming::Request(value),
                Err(e) => Incoming::Malformed(e.to_string()),
            }));
        }
        Ok(None)
    }

    /// Write one frame and flush.
    pub async fn send(&mut self, message: &Value) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }
}
