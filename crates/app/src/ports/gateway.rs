//! Gateway transport port — the socket-owning side of the bridge.

use std::future::Future;

use cubelink_domain::error::TransportError;
use cubelink_domain::gateway::SessionState;

/// Lines returned by one poll exchange.
///
/// A failed batch still carries every line read before the failure so the
/// caller can merge what arrived.
#[derive(Debug, Default)]
pub struct PollBatch {
    pub lines: Vec<String>,
    pub error: Option<TransportError>,
}

impl PollBatch {
    #[must_use]
    pub fn complete(lines: Vec<String>) -> Self {
        Self { lines, error: None }
    }

    #[must_use]
    pub fn failed(lines: Vec<String>, error: TransportError) -> Self {
        Self {
            lines,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// A session to the gateway.
///
/// Implementations own the socket and its reconnect policy. The coordinator
/// serialises every call behind one mutex, so implementations never see two
/// exchanges at once.
pub trait GatewayTransport: Send {
    /// Request a full state batch and read it up to its terminating record.
    ///
    /// Never fails outright: transport errors are reported through
    /// [`PollBatch::error`] alongside any partial lines.
    fn poll_batch(&mut self) -> impl Future<Output = PollBatch> + Send;

    /// Send one command line and return the single reply line.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when connecting, writing or reading fails.
    /// The session is closed before the error is returned; no retry happens.
    fn send_command(
        &mut self,
        payload: &str,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Best-effort close; errors are swallowed.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    fn state(&self) -> SessionState;
}
