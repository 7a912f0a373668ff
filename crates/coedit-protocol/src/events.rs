//! Event types exchanged between clients and the server.
//!
//! Events are adjacently tagged: the variant name travels in `event`
//! (kebab-case) and the payload in `data` (camelCase fields).

use serde::{Deserialize, Serialize};

/// A document identifier, as assigned by the document store.
pub type DocumentId = String;

/// Maximum document identifier length in bytes.
pub const MAX_DOCUMENT_ID_LENGTH: usize = 256;

/// Error codes carried by [`ServerEvent::Error`].
pub mod error_codes {
    /// The frame could not be decoded into a known event.
    pub const MALFORMED_FRAME: u16 = 1001;
    /// The event referenced an unusable document identifier.
    pub const INVALID_DOCUMENT: u16 = 1002;
}

/// Validate a document identifier.
///
/// # Errors
///
/// Returns an error message if the identifier is empty, too long, or
/// contains control characters.
pub fn validate_document_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Document id cannot be empty");
    }
    if id.len() > MAX_DOCUMENT_ID_LENGTH {
        return Err("Document id too long");
    }
    if id.chars().any(char::is_control) {
        return Err("Document id contains control characters");
    }
    Ok(())
}

/// An edit submitted by a client.
///
/// `changes` is kept as an opaque JSON value: the server relays it verbatim
/// and never looks inside (clients send `{text, timestamp}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChange {
    /// Target document.
    pub document_id: DocumentId,
    /// The edit payload.
    pub changes: serde_json::Value,
}

/// Events sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Start viewing a document.
    JoinDocument(DocumentId),
    /// Stop viewing a document.
    LeaveDocument(DocumentId),
    /// The user started typing in a document.
    TypingStart(DocumentId),
    /// The user stopped typing in a document.
    TypingEnd(DocumentId),
    /// An edit to relay to the other viewers.
    DocumentChange(DocumentChange),
}

impl ClientEvent {
    /// The wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinDocument(_) => "join-document",
            ClientEvent::LeaveDocument(_) => "leave-document",
            ClientEvent::TypingStart(_) => "typing-start",
            ClientEvent::TypingEnd(_) => "typing-end",
            ClientEvent::DocumentChange(_) => "document-change",
        }
    }

    /// The document this event targets.
    #[must_use]
    pub fn document_id(&self) -> &str {
        match self {
            ClientEvent::JoinDocument(id)
            | ClientEvent::LeaveDocument(id)
            | ClientEvent::TypingStart(id)
            | ClientEvent::TypingEnd(id) => id,
            ClientEvent::DocumentChange(change) => &change.document_id,
        }
    }
}

/// One row of a presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    /// Participant id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether the participant currently signals typing.
    pub is_typing: bool,
}

/// The full member list of a room at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    /// The room's document.
    pub document_id: DocumentId,
    /// Members in join order.
    pub users: Vec<PresenceEntry>,
}

impl PresenceSnapshot {
    /// Look up a member by participant id.
    #[must_use]
    pub fn user(&self, id: &str) -> Option<&PresenceEntry> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Participant ids in snapshot order.
    #[must_use]
    pub fn user_ids(&self) -> Vec<&str> {
        self.users.iter().map(|u| u.id.as_str()).collect()
    }
}

/// Events sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Sent once, right after the socket opens.
    Connected {
        user_id: String,
        user_name: String,
        protocol_version: String,
    },

    /// Someone joined the room. Not sent to the joiner.
    UserJoined {
        user_id: String,
        user_name: String,
        document_id: DocumentId,
    },

    /// Someone left the room.
    UserLeft {
        user_id: String,
        document_id: DocumentId,
    },

    /// Membership snapshot after a join or leave.
    ActiveUsers(PresenceSnapshot),

    /// Membership snapshot after a typing change.
    TypingUpdate(PresenceSnapshot),

    /// An edit made by another member.
    DocumentChanged {
        document_id: DocumentId,
        changes: serde_json::Value,
        user_id: String,
        user_name: String,
    },

    /// A frame from this client was rejected.
    Error { code: u16, message: String },
}

impl ServerEvent {
    /// The wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::UserJoined { .. } => "user-joined",
            ServerEvent::UserLeft { .. } => "user-left",
            ServerEvent::ActiveUsers(_) => "active-users",
            ServerEvent::TypingUpdate(_) => "typing-update",
            ServerEvent::DocumentChanged { .. } => "document-changed",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Create an error event.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code,
            message: message.into(),
        }
    }

    /// The snapshot carried by `active-users` or `typing-update`.
    #[must_use]
    pub fn snapshot(&self) -> Option<&PresenceSnapshot> {
        match self {
            ServerEvent::ActiveUsers(s) | ServerEvent::TypingUpdate(s) => Some(s),
            _ => None,
        }
    }
}
