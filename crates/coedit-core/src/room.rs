//! Document rooms.
//!
//! A room is the set of participants currently viewing one document. It
//! only exists while it has members; the registry deletes it as soon as
//! the last one leaves.

use crate::outbox::Outbox;
use crate::participant::{Participant, ParticipantId};
use coedit_protocol::{DocumentId, PresenceSnapshot, ServerEvent};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// A room member: presence state plus the connection to deliver to.
#[derive(Debug, Clone)]
pub struct Member {
    /// Presence state.
    pub participant: Participant,
    /// Delivery queue of the connection that joined most recently.
    pub outbox: Outbox,
}

/// The live state of one document's room.
#[derive(Debug)]
pub struct DocumentRoom {
    document_id: DocumentId,
    /// Members keyed by participant id, in join order.
    members: IndexMap<ParticipantId, Member>,
}

impl DocumentRoom {
    /// Create an empty room.
    #[must_use]
    pub fn new(document_id: impl Into<DocumentId>) -> Self {
        Self {
            document_id: document_id.into(),
            members: IndexMap::new(),
        }
    }

    /// The document this room belongs to.
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a participant is a member.
    #[must_use]
    pub fn contains(&self, participant_id: &str) -> bool {
        self.members.contains_key(participant_id)
    }

    /// Get a member's presence state.
    #[must_use]
    pub fn participant(&self, participant_id: &str) -> Option<&Participant> {
        self.members.get(participant_id).map(|m| &m.participant)
    }

    /// The connection a member's events are delivered to.
    #[must_use]
    pub fn connection_of(&self, participant_id: &str) -> Option<&str> {
        self.members.get(participant_id).map(|m| m.outbox.connection())
    }

    /// Insert or overwrite a member.
    ///
    /// An overwrite keeps the member's original position and resets it to
    /// idle. Returns `true` if this is a new member.
    pub fn upsert(&mut self, participant: Participant, outbox: Outbox) -> bool {
        let id = participant.id.clone();
        let previous = self.members.insert(id.clone(), Member { participant, outbox });

        debug!(
            document = %self.document_id,
            participant = %id,
            members = self.members.len(),
            rejoin = previous.is_some(),
            "Member joined"
        );

        previous.is_none()
    }

    /// Remove a member, returning it if it was present.
    pub fn remove(&mut self, participant_id: &str) -> Option<Member> {
        let removed = self.members.shift_remove(participant_id);
        if removed.is_some() {
            debug!(
                document = %self.document_id,
                participant = %participant_id,
                members = self.members.len(),
                "Member left"
            );
        }
        removed
    }

    /// Set a member's typing flag.
    ///
    /// Returns `false` without touching anything if the participant is not
    /// a member.
    pub fn set_typing(&mut self, participant_id: &str, is_typing: bool) -> bool {
        match self.members.get_mut(participant_id) {
            Some(member) => {
                member.participant.is_typing = is_typing;
                true
            }
            None => false,
        }
    }

    /// The full member list, in join order.
    #[must_use]
    pub fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot {
            document_id: self.document_id.clone(),
            users: self.members.values().map(|m| m.participant.to_entry()).collect(),
        }
    }

    /// Deliver an event to every member.
    ///
    /// Returns the number of members the event was queued for. A closed
    /// connection is skipped without affecting the others.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        self.deliver(event, None)
    }

    /// Deliver an event to every member except `excluded`.
    pub fn broadcast_except(&self, excluded: &str, event: ServerEvent) -> usize {
        self.deliver(event, Some(excluded))
    }

    fn deliver(&self, event: ServerEvent, excluded: Option<&str>) -> usize {
        let event = Arc::new(event);
        let delivered = self
            .members
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != excluded)
            .filter(|(_, member)| member.outbox.deliver(Arc::clone(&event)))
            .count();

        trace!(
            document = %self.document_id,
            event = event.name(),
            recipients = delivered,
            "Broadcast"
        );
        delivered
    }
}
