//! WebSocket transport implementation.
//!
//! Wraps an upgraded axum [`WebSocket`]. Text frames are decoded as JSON,
//! binary frames as length-prefixed MessagePack; outbound events use the
//! encoding negotiated at connect time.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::BytesMut;
use coedit_protocol::{codec, ClientEvent, Encoding, Payload, ProtocolError, ServerEvent};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tracing::{debug, warn};

use crate::traits::{Connection, ConnectionId, EventSink, EventStream, TransportError};

/// Default maximum inbound message size (64 KiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// An upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    socket: WebSocket,
    encoding: Encoding,
    remote_addr: Option<SocketAddr>,
    max_message_size: usize,
}

impl WebSocketConnection {
    /// Wrap an upgraded socket.
    #[must_use]
    pub fn new(socket: WebSocket, encoding: Encoding) -> Self {
        Self {
            id: ConnectionId::generate(),
            socket,
            encoding,
            remote_addr: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Record the peer address for logging.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Limit the size of an inbound message. Larger messages are rejected
    /// with a recoverable error and the connection stays open.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

impl Connection for WebSocketConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn remote_addr(&self) -> Option<String> {
        self.remote_addr.map(|a| a.to_string())
    }

    fn split(self: Box<Self>) -> (Box<dyn EventSink>, Box<dyn EventStream>) {
        let (sink, stream) = self.socket.split();

        let sink = WebSocketSink {
            id: self.id.clone(),
            sink,
            encoding: self.encoding,
        };
        let stream = WebSocketEvents {
            id: self.id,
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            max_message_size: self.max_message_size,
        };

        (Box::new(sink), Box::new(stream))
    }
}

/// Outbound half of a [`WebSocketConnection`].
pub struct WebSocketSink {
    id: ConnectionId,
    sink: SplitSink<WebSocket, Message>,
    encoding: Encoding,
}

#[async_trait]
impl EventSink for WebSocketSink {
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError> {
        let message = match self.encoding.encode(event)? {
            Payload::Text(text) => Message::Text(text),
            Payload::Binary(data) => Message::Binary(data.to_vec()),
        };

        self.sink
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        debug!(connection = %self.id, "Closing WebSocket");
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {e}")))
    }
}

/// Inbound half of a [`WebSocketConnection`].
pub struct WebSocketEvents {
    id: ConnectionId,
    stream: SplitStream<WebSocket>,
    read_buffer: BytesMut,
    max_message_size: usize,
}

impl WebSocketEvents {
    fn decode_buffered(&mut self) -> Result<Option<ClientEvent>, TransportError> {
        match codec::decode_from(&mut self.read_buffer) {
            Ok(event) => Ok(event),
            Err(e) => {
                if matches!(e, ProtocolError::FrameTooLarge(_)) {
                    self.read_buffer.clear();
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl EventStream for WebSocketEvents {
    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError> {
        loop {
            // Drain any complete binary frame first
            if let Some(event) = self.decode_buffered()? {
                return Ok(Some(event));
            }

            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > self.max_message_size {
                        warn!(
                            connection = %self.id,
                            size = text.len(),
                            max = self.max_message_size,
                            "Text message too large"
                        );
                        return Err(TransportError::MessageTooLarge {
                            size: text.len(),
                            max: self.max_message_size,
                        });
                    }
                    return codec::decode_json(&text)
                        .map(Some)
                        .map_err(TransportError::from);
                }
                Some(Ok(Message::Binary(data))) => {
                    let size = self.read_buffer.len() + data.len();
                    if size > self.max_message_size {
                        warn!(
                            connection = %self.id,
                            size,
                            max = self.max_message_size,
                            "Binary message too large"
                        );
                        self.read_buffer.clear();
                        return Err(TransportError::MessageTooLarge {
                            size,
                            max: self.max_message_size,
                        });
                    }
                    self.read_buffer.extend_from_slice(&data);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // axum answers pings itself
                }
                Some(Ok(Message::Close(_))) => {
                    debug!(connection = %self.id, "Received close frame");
                    return Ok(None);
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    debug!(connection = %self.id, "WebSocket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}
