//! Participant identity and per-room state.

use coedit_protocol::PresenceEntry;
use std::fmt;

/// A participant identifier, as issued by the identity provider.
pub type ParticipantId = String;

/// Number of id characters used in a placeholder display name.
const FALLBACK_NAME_PREFIX: usize = 4;

/// The authenticated identity attached to a connection.
///
/// Resolved once by the identity gate and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Server-assigned participant id. This, not the connection id,
    /// decides who an event came from.
    pub participant_id: ParticipantId,
    /// Name shown to other participants.
    pub display_name: String,
}

impl Identity {
    /// Create an identity.
    #[must_use]
    pub fn new(participant_id: impl Into<ParticipantId>, display_name: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Create an identity whose display name is derived from the id.
    #[must_use]
    pub fn with_fallback_name(participant_id: impl Into<ParticipantId>) -> Self {
        let participant_id = participant_id.into();
        let display_name = fallback_display_name(&participant_id);
        Self {
            participant_id,
            display_name,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.participant_id)
    }
}

/// Placeholder display name: `"User "` followed by the first four
/// characters of the participant id.
#[must_use]
pub fn fallback_display_name(participant_id: &str) -> String {
    let prefix: String = participant_id.chars().take(FALLBACK_NAME_PREFIX).collect();
    format!("User {prefix}")
}

/// A participant's state inside one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Participant id.
    pub id: ParticipantId,
    /// Display name.
    pub display_name: String,
    /// Set by `typing-start`, cleared by `typing-end`.
    pub is_typing: bool,
}

impl Participant {
    /// A freshly joined, idle participant.
    #[must_use]
    pub fn new(identity: &Identity) -> Self {
        Self {
            id: identity.participant_id.clone(),
            display_name: identity.display_name.clone(),
            is_typing: false,
        }
    }

    /// The presence row for this participant.
    #[must_use]
    pub fn to_entry(&self) -> PresenceEntry {
        PresenceEntry {
            id: self.id.clone(),
            name: self.display_name.clone(),
            is_typing: self.is_typing,
        }
    }
}
