//! The session registry.
//!
//! The registry is the single owner of every room. Each room lives in its
//! own map entry and is only mutated while that entry's lock is held; the
//! broadcast triggered by a mutation is queued under the same lock, so
//! members see snapshots in exactly the order the mutations happened.
//! Rooms for different documents are independent.

use crate::outbox::Outbox;
use crate::participant::{Identity, Participant, ParticipantId};
use crate::presence;
use crate::relay;
use crate::room::DocumentRoom;
use crate::typing::{self, TypingSignal};
use coedit_protocol::{DocumentId, PresenceSnapshot};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::{debug, info};

/// Registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of live rooms.
    pub room_count: usize,
    /// Number of distinct participants in at least one room.
    pub participant_count: usize,
    /// Sum of all rooms' member counts.
    pub total_memberships: usize,
}

/// Who is viewing which document.
#[derive(Default)]
pub struct SessionRegistry {
    /// Rooms indexed by document id. A room is present iff it has members.
    rooms: DashMap<DocumentId, DocumentRoom>,
    /// Reverse index: participant id -> documents it is a member of.
    /// Only touched while holding the corresponding room entry.
    memberships: DashMap<ParticipantId, HashSet<DocumentId>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        info!("Creating session registry");
        Self::default()
    }

    /// Add a participant to a document's room, creating the room if needed.
    ///
    /// Joining twice overwrites the existing entry (keeping its position and
    /// clearing its typing flag) and re-points delivery at `outbox`. Other
    /// members are sent `user-joined` only for a new member; every member,
    /// the joiner included, then receives an `active-users` snapshot.
    ///
    /// Returns `true` if the participant was not already a member.
    pub fn join(&self, document_id: &str, identity: &Identity, outbox: Outbox) -> bool {
        let participant = Participant::new(identity);

        let mut room = self
            .rooms
            .entry(document_id.to_string())
            .or_insert_with(|| {
                debug!(document = %document_id, "Creating room");
                DocumentRoom::new(document_id)
            });

        let is_new = room.upsert(participant.clone(), outbox);
        self.memberships
            .entry(participant.id.clone())
            .or_default()
            .insert(document_id.to_string());

        if is_new {
            presence::announce_join(&room, &participant);
        }
        presence::broadcast_active_users(&room);

        is_new
    }

    /// Remove a participant from a document's room.
    ///
    /// Deletes the room if it becomes empty; otherwise the remaining members
    /// receive `user-left` followed by an `active-users` snapshot. Does
    /// nothing if the room or the membership is already gone.
    ///
    /// Returns `true` if the participant was a member.
    pub fn leave(&self, document_id: &str, participant_id: &str) -> bool {
        self.remove_member(document_id, participant_id, None)
    }

    /// Remove a participant from every room it is in.
    ///
    /// Safe to call at any time, including after some or all of the
    /// participant's rooms were already left. Returns the documents that
    /// were actually left.
    pub fn disconnect_all(&self, participant_id: &str) -> Vec<DocumentId> {
        let documents = self
            .memberships
            .remove(participant_id)
            .map(|(_, documents)| documents)
            .unwrap_or_default();

        let left: Vec<DocumentId> = documents
            .into_iter()
            .filter(|document_id| self.leave(document_id, participant_id))
            .collect();

        debug!(participant = %participant_id, rooms = left.len(), "Left all rooms");
        left
    }

    /// Remove a participant from the rooms it is in through `connection`.
    ///
    /// Rooms where the participant has since re-joined from another
    /// connection are left untouched. Returns the documents that were left.
    pub fn disconnect_connection(&self, participant_id: &str, connection: &str) -> Vec<DocumentId> {
        let left: Vec<DocumentId> = self
            .rooms_of(participant_id)
            .into_iter()
            .filter(|document_id| {
                self.remove_member(document_id, participant_id, Some(connection))
            })
            .collect();

        debug!(
            participant = %participant_id,
            connection = %connection,
            rooms = left.len(),
            "Left rooms of connection"
        );
        left
    }

    /// Apply a typing signal.
    ///
    /// If the participant is a member of the room, its flag is updated and
    /// every member receives a `typing-update` snapshot. Otherwise nothing
    /// happens. Returns whether the signal was applied.
    pub fn typing(&self, document_id: &str, participant_id: &str, signal: TypingSignal) -> bool {
        let Some(mut room) = self.rooms.get_mut(document_id) else {
            return false;
        };

        if !typing::apply(&mut room, participant_id, signal) {
            return false;
        }
        presence::broadcast_typing(&room);

        true
    }

    /// Relay an edit from `sender_id` to the other members of the room.
    ///
    /// Returns `None` if the room does not exist or the sender is not a
    /// member; otherwise the number of recipients.
    pub fn relay(
        &self,
        document_id: &str,
        sender_id: &str,
        changes: serde_json::Value,
    ) -> Option<usize> {
        let room = self.rooms.get(document_id)?;
        relay::relay(&room, sender_id, changes)
    }

    /// Check if a room exists.
    #[must_use]
    pub fn room_exists(&self, document_id: &str) -> bool {
        self.rooms.contains_key(document_id)
    }

    /// Get the member count of a room (0 if it does not exist).
    #[must_use]
    pub fn member_count(&self, document_id: &str) -> usize {
        self.rooms.get(document_id).map(|r| r.len()).unwrap_or(0)
    }

    /// Get a room's current presence snapshot.
    #[must_use]
    pub fn snapshot(&self, document_id: &str) -> Option<PresenceSnapshot> {
        self.rooms.get(document_id).map(|r| r.snapshot())
    }

    /// Get a participant's state in a room.
    #[must_use]
    pub fn participant(&self, document_id: &str, participant_id: &str) -> Option<Participant> {
        self.rooms
            .get(document_id)
            .and_then(|r| r.participant(participant_id).cloned())
    }

    /// Get the documents a participant is a member of, sorted.
    #[must_use]
    pub fn rooms_of(&self, participant_id: &str) -> Vec<DocumentId> {
        let mut documents: Vec<DocumentId> = self
            .memberships
            .get(participant_id)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default();
        documents.sort();
        documents
    }

    /// Number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            participant_count: self.memberships.len(),
            total_memberships: self.rooms.iter().map(|r| r.len()).sum(),
        }
    }

    /// Remove a member, optionally only if it is delivered to through
    /// `connection`.
    fn remove_member(
        &self,
        document_id: &str,
        participant_id: &str,
        connection: Option<&str>,
    ) -> bool {
        let Entry::Occupied(mut entry) = self.rooms.entry(document_id.to_string()) else {
            return false;
        };

        if let Some(connection) = connection {
            if entry.get().connection_of(participant_id) != Some(connection) {
                return false;
            }
        }

        if entry.get_mut().remove(participant_id).is_none() {
            return false;
        }
        self.forget_membership(participant_id, document_id);

        if entry.get().is_empty() {
            entry.remove();
            debug!(document = %document_id, "Deleted empty room");
            return true;
        }

        let room = entry.get();
        presence::announce_leave(room, participant_id);
        presence::broadcast_active_users(room);

        true
    }

    fn forget_membership(&self, participant_id: &str, document_id: &str) {
        if let Entry::Occupied(mut entry) = self.memberships.entry(participant_id.to_string()) {
            entry.get_mut().remove(document_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }
}
