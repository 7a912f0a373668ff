//! Transport abstraction traits for Coedit.
//!
//! These traits define the interface every transport provides, so the
//! session loop never depends on a particular socket type.

use async_trait::async_trait;
use coedit_protocol::{ClientEvent, ProtocolError, ServerEvent};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a connection. Rooms record it so a closing
/// connection only cleans up its own memberships; who sent an event is
/// always decided by the authenticated participant id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a unique connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let counter = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{timestamp:x}_{counter}"))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An inbound message was over the connection's size limit.
    #[error("Message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },
}

impl TransportError {
    /// Whether the connection can keep going after this error.
    ///
    /// A single undecodable or oversized frame is the client's problem,
    /// not the connection's.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::Protocol(_) | TransportError::MessageTooLarge { .. }
        )
    }
}

/// The inbound half of a connection.
#[async_trait]
pub trait EventStream: Send {
    /// Receive the next event.
    ///
    /// Returns `Ok(None)` when the peer closed the connection. Must be
    /// cancel-safe: dropping the future loses no complete event.
    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError>;
}

/// The outbound half of a connection.
#[async_trait]
pub trait EventSink: Send {
    /// Encode and send an event.
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An accepted client connection.
pub trait Connection: Send {
    /// Get the connection's unique identifier.
    fn id(&self) -> &ConnectionId;

    /// Get the remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }

    /// Split into independently usable sink and stream halves.
    fn split(self: Box<Self>) -> (Box<dyn EventSink>, Box<dyn EventStream>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_generation() {
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn_"));
    }

    #[test]
    fn test_protocol_errors_are_recoverable() {
        let decode_error = coedit_protocol::codec::decode_json::<ClientEvent>("{")
            .map(|_| ())
            .unwrap_err();

        assert!(TransportError::Protocol(decode_error).is_recoverable());
        assert!(TransportError::MessageTooLarge { size: 10, max: 5 }.is_recoverable());
        assert!(!TransportError::ConnectionClosed.is_recoverable());
        assert!(!TransportError::ReceiveFailed("reset".into()).is_recoverable());
    }
}
