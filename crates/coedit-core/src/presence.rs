//! Presence broadcasts.
//!
//! Every membership or typing change pushes the room's complete member
//! list to all members, including whoever triggered it. Snapshots rather
//! than deltas: a client that missed one update is corrected by the next.

use crate::participant::Participant;
use crate::room::DocumentRoom;
use coedit_protocol::ServerEvent;

/// Tell everyone but the joiner that `participant` arrived.
pub fn announce_join(room: &DocumentRoom, participant: &Participant) -> usize {
    room.broadcast_except(
        &participant.id,
        ServerEvent::UserJoined {
            user_id: participant.id.clone(),
            user_name: participant.display_name.clone(),
            document_id: room.document_id().to_string(),
        },
    )
}

/// Tell the remaining members that `participant_id` left.
pub fn announce_leave(room: &DocumentRoom, participant_id: &str) -> usize {
    room.broadcast(ServerEvent::UserLeft {
        user_id: participant_id.to_string(),
        document_id: room.document_id().to_string(),
    })
}

/// Push an `active-users` snapshot to every member.
pub fn broadcast_active_users(room: &DocumentRoom) -> usize {
    room.broadcast(ServerEvent::ActiveUsers(room.snapshot()))
}

/// Push a `typing-update` snapshot to every member.
pub fn broadcast_typing(room: &DocumentRoom) -> usize {
    room.broadcast(ServerEvent::TypingUpdate(room.snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::{Inbox, Outbox};
    use crate::participant::Identity;

    fn join(room: &mut DocumentRoom, id: &str, name: &str) -> (Participant, Inbox) {
        let (outbox, inbox) = Outbox::channel(format!("conn-{id}"));
        let participant = Participant::new(&Identity::new(id, name));
        room.upsert(participant.clone(), outbox);
        (participant, inbox)
    }

    #[test]
    fn test_announce_join_skips_joiner() {
        let mut room = DocumentRoom::new("doc1");
        let (_, mut a) = join(&mut room, "a", "Alice");
        let (bob, mut b) = join(&mut room, "b", "Bob");

        assert_eq!(announce_join(&room, &bob), 1);
        assert!(b.try_recv().is_err());
        assert_eq!(
            *a.try_recv().unwrap(),
            ServerEvent::UserJoined {
                user_id: "b".into(),
                user_name: "Bob".into(),
                document_id: "doc1".into(),
            }
        );
    }

    #[test]
    fn test_snapshot_reaches_everyone() {
        let mut room = DocumentRoom::new("doc1");
        let (_, mut a) = join(&mut room, "a", "Alice");
        let (_, mut b) = join(&mut room, "b", "Bob");
        room.set_typing("b", true);

        assert_eq!(broadcast_typing(&room), 2);

        for inbox in [&mut a, &mut b] {
            let event = inbox.try_recv().unwrap();
            assert_eq!(event.name(), "typing-update");
            let snapshot = event.snapshot().unwrap();
            assert_eq!(snapshot.user_ids(), vec!["a", "b"]);
            assert!(snapshot.user("b").unwrap().is_typing);
            assert!(!snapshot.user("a").unwrap().is_typing);
        }
    }
}
