//! Per-connection delivery queues.
//!
//! Every connection owns one [`Inbox`]; rooms hold the matching [`Outbox`]
//! for each member. Sends never block, so a room can broadcast while its
//! lock is held and recipients observe events in mutation order.
//!
//! Queues are bounded. When a connection falls [`DEFAULT_CAPACITY`] events
//! behind, further events for it are dropped and the outbox is flagged as
//! lagging; the owning session is expected to close the connection so the
//! client reconnects and starts again from a fresh snapshot.

use coedit_protocol::ServerEvent;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Events a connection may have queued before it counts as lagging.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Receiving half of a connection's queue.
pub type Inbox = mpsc::Receiver<Arc<ServerEvent>>;

/// Sending half of a connection's queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    connection: Arc<str>,
    sender: mpsc::Sender<Arc<ServerEvent>>,
    lagged: Arc<Notify>,
}

impl Outbox {
    /// Create a queue for the given connection.
    #[must_use]
    pub fn channel(connection: impl Into<Arc<str>>) -> (Self, Inbox) {
        Self::with_capacity(connection, DEFAULT_CAPACITY)
    }

    /// Create a queue holding at most `capacity` undelivered events.
    #[must_use]
    pub fn with_capacity(connection: impl Into<Arc<str>>, capacity: usize) -> (Self, Inbox) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let outbox = Self {
            connection: connection.into(),
            sender,
            lagged: Arc::new(Notify::new()),
        };
        (outbox, receiver)
    }

    /// The connection this outbox feeds.
    #[must_use]
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Queue an event for delivery.
    ///
    /// Best-effort: returns `false` if the connection is already gone or
    /// its queue is full. A full queue also marks the outbox as lagging.
    pub fn deliver(&self, event: Arc<ServerEvent>) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!(
                    connection = %self.connection,
                    event = event.name(),
                    "Outbox full, dropping event"
                );
                self.lagged.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!(connection = %self.connection, "Dropped event for closed connection");
                false
            }
        }
    }

    /// Queue an event that only this connection will see.
    pub fn deliver_direct(&self, event: ServerEvent) -> bool {
        self.deliver(Arc::new(event))
    }

    /// Resolves once an event has been dropped because the queue was full.
    ///
    /// An overflow that happened before this is awaited still counts.
    pub async fn lagged(&self) {
        self.lagged.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deliver_after_close() {
        let (outbox, inbox) = Outbox::channel("conn-1");
        assert!(outbox.deliver_direct(ServerEvent::error(1001, "x")));

        drop(inbox);
        assert!(!outbox.deliver_direct(ServerEvent::error(1001, "y")));
    }

    #[tokio::test]
    async fn test_deliver_order() {
        let (outbox, mut inbox) = Outbox::channel("conn-1");
        outbox.deliver_direct(ServerEvent::error(1, "first"));
        outbox.deliver_direct(ServerEvent::error(2, "second"));

        assert_eq!(*inbox.recv().await.unwrap(), ServerEvent::error(1, "first"));
        assert_eq!(*inbox.recv().await.unwrap(), ServerEvent::error(2, "second"));
        assert_eq!(outbox.connection(), "conn-1");
    }

    #[tokio::test]
    async fn test_full_queue_flags_lagging() {
        let (outbox, mut inbox) = Outbox::with_capacity("conn-1", 2);
        assert!(outbox.deliver_direct(ServerEvent::error(1, "a")));
        assert!(outbox.deliver_direct(ServerEvent::error(2, "b")));
        assert!(!outbox.deliver_direct(ServerEvent::error(3, "c")));

        // A clone shares the flag, as rooms hold clones of the session's outbox
        let held_by_room = outbox.clone();
        tokio::time::timeout(Duration::from_secs(1), held_by_room.lagged())
            .await
            .expect("overflow was not signalled");

        // Queued events are still delivered; the overflowing one is gone
        assert_eq!(*inbox.recv().await.unwrap(), ServerEvent::error(1, "a"));
        assert_eq!(*inbox.recv().await.unwrap(), ServerEvent::error(2, "b"));
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_not_lagging_while_within_capacity() {
        let (outbox, _inbox) = Outbox::with_capacity("conn-1", 2);
        assert!(outbox.deliver_direct(ServerEvent::error(1, "a")));

        let waited = tokio::time::timeout(Duration::from_millis(50), outbox.lagged()).await;
        assert!(waited.is_err());
    }
}
