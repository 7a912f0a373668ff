//! # coedit-transport
//!
//! Connection abstraction for the Coedit session coordinator.
//!
//! The session loop only sees typed events: a [`Connection`] splits into an
//! [`EventStream`] of decoded [`ClientEvent`](coedit_protocol::ClientEvent)s
//! and an [`EventSink`] that encodes
//! [`ServerEvent`](coedit_protocol::ServerEvent)s for the wire.
//!
//! - **WebSocket** - axum upgrade, JSON text or MessagePack binary frames
//! - **Memory** - channel-backed pair for tests
//!
//! ```rust,ignore
//! use coedit_transport::Connection;
//!
//! async fn pump(conn: Box<dyn Connection>) {
//!     let (mut sink, mut stream) = conn.split();
//!     while let Ok(Some(event)) = stream.recv().await {
//!         // Dispatch event
//!     }
//!     let _ = sink.close().await;
//! }
//! ```

pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub use traits::{Connection, ConnectionId, EventSink, EventStream, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

#[cfg(any(test, feature = "memory"))]
pub use memory::{MemoryClient, MemoryConnection};
