//! In-memory transport.
//!
//! A channel-backed connection pair for exercising the session loop
//! without sockets. Both directions carry JSON text, so the same codec
//! path as a browser client is used.

use async_trait::async_trait;
use coedit_protocol::{codec, ClientEvent, ServerEvent};
use tokio::sync::mpsc;

use crate::traits::{Connection, ConnectionId, EventSink, EventStream, TransportError};

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

/// Client side of an in-memory connection.
pub struct MemoryClient {
    outgoing: Option<mpsc::UnboundedSender<String>>,
    incoming: mpsc::UnboundedReceiver<String>,
}

impl MemoryConnection {
    /// Create a connected pair.
    #[must_use]
    pub fn pair(id: impl Into<ConnectionId>) -> (Self, MemoryClient) {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();

        let connection = Self {
            id: id.into(),
            incoming: server_rx,
            outgoing: server_tx,
        };
        let client = MemoryClient {
            outgoing: Some(client_tx),
            incoming: client_rx,
        };

        (connection, client)
    }
}

impl Connection for MemoryConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn split(self: Box<Self>) -> (Box<dyn EventSink>, Box<dyn EventStream>) {
        let sink = MemorySink {
            outgoing: Some(self.outgoing),
        };
        let stream = MemoryStream {
            incoming: self.incoming,
        };
        (Box::new(sink), Box::new(stream))
    }
}

struct MemorySink {
    outgoing: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl EventSink for MemorySink {
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError> {
        let outgoing = self
            .outgoing
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;
        outgoing
            .send(codec::encode_json(event)?)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outgoing = None;
        Ok(())
    }
}

struct MemoryStream {
    incoming: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl EventStream for MemoryStream {
    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError> {
        match self.incoming.recv().await {
            Some(text) => Ok(Some(codec::decode_json(&text)?)),
            None => Ok(None),
        }
    }
}

impl MemoryClient {
    /// Send an event to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the client hung up or the server side is gone.
    pub fn send(&self, event: &ClientEvent) -> Result<(), TransportError> {
        self.send_text(codec::encode_json(event)?)
    }

    /// Send raw text, decoded by the server as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the client hung up or the server side is gone.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.outgoing
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?
            .send(text.into())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Receive the next event from the server.
    ///
    /// Returns `None` once the server closed its side.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        let text = self.incoming.recv().await?;
        codec::decode_json(&text).ok()
    }

    /// Hang up. The server sees the stream end.
    pub fn close(&mut self) {
        self.outgoing = None;
    }
}
