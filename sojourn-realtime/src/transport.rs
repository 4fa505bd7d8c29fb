//! Transport abstraction for realtime hub connections.
//!
//! The connection manager owns the state machine; the transport only knows
//! how to open an authenticated session and move text frames. Production
//! uses the WebSocket implementation in [`crate::ws`]; tests script their
//! own.

use async_trait::async_trait;

use crate::error::RealtimeError;

/// Connector for one hub endpoint.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open an authenticated session. `authorization` is the full header
    /// value (`Bearer <token>`), produced by the credential layer.
    async fn connect(
        &self,
        endpoint: &str,
        authorization: &str,
    ) -> Result<Box<dyn TransportSession>, RealtimeError>;
}

/// One established connection.
#[async_trait]
pub trait TransportSession: Send {
    async fn send(&mut self, text: &str) -> Result<(), RealtimeError>;

    /// Next inbound text frame. `None` means the peer closed cleanly;
    /// `Some(Err(_))` means the connection failed.
    async fn recv(&mut self) -> Option<Result<String, RealtimeError>>;

    async fn close(&mut self);
}
