//! Per-connection session lifecycle.
//!
//! A session owns one authenticated connection. It announces the resolved
//! identity, then pumps two directions until the peer goes away: decoded
//! client events are applied to the registry, and events queued for this
//! connection by any room are written to the socket. However the session
//! ends, the participant is removed from every room it joined through this
//! connection. Rooms it has since re-joined from a newer connection keep it.

use crate::metrics::{self, ConnectionMetricsGuard};
use coedit_core::{Identity, Outbox, SessionRegistry, TypingSignal};
use coedit_protocol::{
    error_codes, validate_document_id, ClientEvent, ServerEvent, PROTOCOL_VERSION,
};
use coedit_transport::Connection;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Removes the participant from this connection's rooms when the session ends.
struct DisconnectGuard {
    registry: Arc<SessionRegistry>,
    participant_id: String,
    connection: String,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let left = self
            .registry
            .disconnect_connection(&self.participant_id, &self.connection);
        if !left.is_empty() {
            debug!(participant = %self.participant_id, rooms = ?left, "Left rooms on disconnect");
        }
        metrics::set_active_rooms(self.registry.room_count());
    }
}

/// One authenticated connection's view of the registry.
struct Session {
    registry: Arc<SessionRegistry>,
    identity: Identity,
    outbox: Outbox,
}

/// Serve a connection until it closes.
pub async fn run(
    connection: Box<dyn Connection>,
    identity: Identity,
    registry: Arc<SessionRegistry>,
) {
    let span = info_span!(
        "session",
        connection = %connection.id(),
        participant = %identity.participant_id,
    );
    run_session(connection, identity, registry)
        .instrument(span)
        .await;
}

async fn run_session(
    connection: Box<dyn Connection>,
    identity: Identity,
    registry: Arc<SessionRegistry>,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();
    let _disconnect = DisconnectGuard {
        registry: Arc::clone(&registry),
        participant_id: identity.participant_id.clone(),
        connection: connection.id().as_str().to_string(),
    };

    info!(
        name = %identity.display_name,
        remote = connection.remote_addr().as_deref().unwrap_or("unknown"),
        "Connected"
    );

    let (outbox, mut inbox) = Outbox::channel(connection.id().as_str());
    let (mut sink, mut stream) = connection.split();

    let connected = ServerEvent::Connected {
        user_id: identity.participant_id.clone(),
        user_name: identity.display_name.clone(),
        protocol_version: PROTOCOL_VERSION.to_string(),
    };
    if let Err(e) = sink.send(&connected).await {
        warn!(error = %e, "Failed to send connected event");
        return;
    }

    let session = Session {
        registry,
        identity,
        outbox,
    };

    loop {
        tokio::select! {
            biased;

            () = session.outbox.lagged() => {
                warn!("Client fell too far behind, closing session");
                metrics::record_error("lagging");
                break;
            }

            // Events queued for this connection by the rooms it is in
            Some(event) = inbox.recv() => {
                metrics::record_event(event.name(), "outbound");
                if let Err(e) = sink.send(&event).await {
                    debug!(error = %e, "Send failed, closing session");
                    metrics::record_error("send");
                    break;
                }
            }

            received = stream.recv() => {
                match received {
                    Ok(Some(event)) => {
                        let start = Instant::now();
                        metrics::record_event(event.name(), "inbound");
                        session.dispatch(event);
                        metrics::record_latency(start.elapsed().as_secs_f64());
                    }
                    Ok(None) => break,
                    Err(e) if e.is_recoverable() => {
                        debug!(error = %e, "Rejected malformed frame");
                        metrics::record_error("malformed_frame");
                        session.reject(error_codes::MALFORMED_FRAME, e.to_string());
                    }
                    Err(e) => {
                        warn!(error = %e, "Connection error");
                        metrics::record_error("transport");
                        break;
                    }
                }
            }
        }
    }

    let _ = sink.close().await;
    info!("Disconnected");
}

impl Session {
    fn participant_id(&self) -> &str {
        &self.identity.participant_id
    }

    /// Send an error to this connection only.
    fn reject(&self, code: u16, message: impl Into<String>) {
        self.outbox.deliver_direct(ServerEvent::error(code, message));
    }

    /// Apply one client event to the registry.
    fn dispatch(&self, event: ClientEvent) {
        if let Err(reason) = validate_document_id(event.document_id()) {
            debug!(event = event.name(), reason, "Invalid document id");
            metrics::record_error("invalid_document");
            self.reject(error_codes::INVALID_DOCUMENT, reason);
            return;
        }

        match event {
            ClientEvent::JoinDocument(document_id) => {
                self.registry
                    .join(&document_id, &self.identity, self.outbox.clone());
                metrics::set_active_rooms(self.registry.room_count());
            }
            ClientEvent::LeaveDocument(document_id) => {
                if self.registry.leave(&document_id, self.participant_id()) {
                    metrics::set_active_rooms(self.registry.room_count());
                }
            }
            ClientEvent::TypingStart(_) | ClientEvent::TypingEnd(_) => {
                if let Some(signal) = TypingSignal::from_event(&event) {
                    self.registry
                        .typing(event.document_id(), self.participant_id(), signal);
                }
            }
            ClientEvent::DocumentChange(change) => {
                match self
                    .registry
                    .relay(&change.document_id, self.participant_id(), change.changes)
                {
                    Some(recipients) => metrics::record_relay(recipients),
                    None => {
                        debug!(document = %change.document_id, "Change for unjoined document ignored");
                    }
                }
            }
        }
    }
}
