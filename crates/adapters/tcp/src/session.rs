//! Gateway session over a plain TCP stream.
//!
//! The gateway speaks CRLF-terminated text lines. A poll is the `l:` request
//! followed by every line up to and including the `L:` live-state record; a
//! command is one line out and one line back.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use cubelink_app::ports::{GatewayTransport, PollBatch};
use cubelink_domain::error::{TransportError, ValidationError};
use cubelink_domain::gateway::SessionState;
use cubelink_domain::protocol;

use crate::config::GatewayConfig;

/// Longest line accepted from the gateway, terminator included.
pub const MAX_LINE_LEN: usize = 16 * 1024;

/// Connection to a single gateway.
///
/// Each exchange opens the socket if needed, counts towards the per-connection
/// request budget, and closes it again unless the session is exclusive. Any
/// failure closes the socket; the next exchange reconnects.
#[derive(Debug)]
pub struct GatewaySession {
    config: GatewayConfig,
    state: SessionState,
    request_count: u32,
    stream: Option<BufReader<TcpStream>>,
}

impl GatewaySession {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when `config` is invalid.
    pub fn new(config: GatewayConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            state: SessionState::Disconnected,
            request_count: 0,
            stream: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Requests served by the current connection.
    #[must_use]
    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect unless already open, recycling a connection that has used up
    /// its request budget.
    ///
    /// A reused connection is first cleared of lines sent after the previous
    /// exchange ended, so the next reply is read in step. If the gateway hung
    /// up in the meantime a fresh connection is opened.
    async fn ensure_open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() && self.request_count >= self.config.max_requests_per_connection
        {
            tracing::debug!(requests = self.request_count, "recycling gateway connection");
            self.disconnect().await;
        }
        if let Some(stream) = self.stream.as_mut() {
            match read_ready(stream).await {
                Ok((stale, false)) => {
                    for line in &stale {
                        tracing::debug!(line, "unsolicited gateway line discarded");
                    }
                    return Ok(());
                }
                Ok((_, true)) => {
                    tracing::debug!("gateway closed the idle connection, reconnecting");
                    self.disconnect().await;
                }
                Err(err) => {
                    tracing::debug!(%err, "idle gateway connection unusable, reconnecting");
                    self.disconnect().await;
                }
            }
        }

        let addr = self.config.addr();
        self.state = SessionState::Connecting;
        tracing::debug!(%addr, "connecting to gateway");

        match timeout(self.config.connect_timeout(), TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Err(err) = stream.set_nodelay(true) {
                    tracing::debug!(%err, "TCP_NODELAY not applied");
                }
                self.stream = Some(BufReader::new(stream));
                self.request_count = 0;
                self.state = SessionState::Open;
                tracing::debug!(%addr, "gateway connected");
                Ok(())
            }
            Ok(Err(source)) => {
                self.state = SessionState::Disconnected;
                Err(TransportError::Connect { addr, source })
            }
            Err(_) => {
                self.state = SessionState::Disconnected;
                Err(TransportError::ConnectTimeout { addr })
            }
        }
    }

    /// Send the poll request, then collect lines until the batch terminator,
    /// plus any lines already received behind it. End of stream before the
    /// terminator is an error; lines read so far are left in `lines`.
    ///
    /// Returns `true` when the gateway closed the stream after the batch.
    async fn exchange_batch(&mut self, lines: &mut Vec<String>) -> Result<bool, TransportError> {
        self.ensure_open().await?;
        self.request_count += 1;
        let read_timeout = self.config.read_timeout();
        let stream = self.stream.as_mut().ok_or(TransportError::UnexpectedEof)?;

        write_line(stream, protocol::POLL_REQUEST).await?;
        loop {
            let Some(line) = read_line(stream, read_timeout).await? else {
                return Err(TransportError::UnexpectedEof);
            };
            if line.trim().is_empty() {
                continue;
            }
            let done = protocol::is_batch_terminator(&line);
            lines.push(line);
            if done {
                let (trailing, closed) = read_ready(stream).await?;
                lines.extend(trailing);
                return Ok(closed);
            }
        }
    }

    async fn exchange_command(&mut self, payload: &str) -> Result<String, TransportError> {
        self.ensure_open().await?;
        self.request_count += 1;
        let read_timeout = self.config.read_timeout();
        let stream = self.stream.as_mut().ok_or(TransportError::UnexpectedEof)?;

        write_line(stream, payload).await?;
        loop {
            match read_line(stream, read_timeout).await? {
                None => return Err(TransportError::UnexpectedEof),
                Some(line) if line.trim().is_empty() => {}
                Some(line) => return Ok(line),
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.get_mut().shutdown().await {
                tracing::debug!(%err, "gateway socket shutdown failed");
            }
            tracing::debug!(requests = self.request_count, "gateway connection closed");
        }
        self.state = SessionState::Disconnected;
    }
}

impl GatewayTransport for GatewaySession {
    async fn poll_batch(&mut self) -> PollBatch {
        let mut lines = Vec::new();
        match self.exchange_batch(&mut lines).await {
            Ok(closed) => {
                if closed || !self.config.exclusive {
                    self.disconnect().await;
                }
                PollBatch::complete(lines)
            }
            Err(err) => {
                self.disconnect().await;
                PollBatch::failed(lines, err)
            }
        }
    }

    async fn send_command(&mut self, payload: &str) -> Result<String, TransportError> {
        let result = self.exchange_command(payload).await;
        if result.is_err() || !self.config.exclusive {
            self.disconnect().await;
        }
        result
    }

    async fn close(&mut self) {
        self.disconnect().await;
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

async fn write_line(stream: &mut BufReader<TcpStream>, line: &str) -> Result<(), TransportError> {
    let socket = stream.get_mut();
    socket.write_all(line.as_bytes()).await?;
    socket.write_all(b"\r\n").await?;
    socket.flush().await?;
    Ok(())
}

/// Read one line without its terminator; `None` on end of stream.
///
/// Invalid UTF-8 is replaced rather than rejected so a corrupt byte only
/// spoils its own line. Lines over [`MAX_LINE_LEN`] are an error.
async fn read_line(
    stream: &mut BufReader<TcpStream>,
    read_timeout: Duration,
) -> Result<Option<String>, TransportError> {
    let mut buf = Vec::new();
    let mut limited = (&mut *stream).take(MAX_LINE_LEN as u64);
    match timeout(read_timeout, limited.read_until(b'\n', &mut buf)).await {
        Err(_) => Err(TransportError::ReadTimeout(read_timeout)),
        Ok(Err(err)) => Err(err.into()),
        Ok(Ok(0)) => Ok(None),
        Ok(Ok(_)) if buf.len() >= MAX_LINE_LEN && !buf.ends_with(b"\n") => {
            Err(TransportError::LineTooLong {
                limit: MAX_LINE_LEN,
            })
        }
        Ok(Ok(_)) => {
            let line = String::from_utf8_lossy(&buf);
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        }
    }
}

/// Complete lines readable without waiting, and whether the gateway closed
/// the stream behind them. A partly received line stays buffered.
async fn read_ready(
    stream: &mut BufReader<TcpStream>,
) -> Result<(Vec<String>, bool), TransportError> {
    let mut lines = Vec::new();
    loop {
        let complete = match timeout(Duration::ZERO, stream.fill_buf()).await {
            Err(_) => false,
            Ok(Err(err)) => return Err(err.into()),
            Ok(Ok([])) => return Ok((lines, true)),
            Ok(Ok(buffered)) => buffered.contains(&b'\n'),
        };
        if !complete {
            return Ok((lines, false));
        }
        match read_line(stream, Duration::ZERO).await? {
            Some(line) if line.trim().is_empty() => {}
            Some(line) => lines.push(line),
            None => return Ok((lines, true)),
        }
    }
}
