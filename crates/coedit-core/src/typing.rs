//! Typing indicators.
//!
//! Typing state is driven purely by explicit client signals. There is no
//! server-side expiry: clients send `typing-end` after their own inactivity
//! window. A client that vanishes mid-typing stays flagged until its
//! disconnect removes it from the room.

use crate::room::DocumentRoom;
use coedit_protocol::ClientEvent;
use tracing::trace;

/// An explicit typing signal from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// `typing-start`
    Start,
    /// `typing-end`
    End,
}

impl TypingSignal {
    /// The flag value this signal sets.
    #[must_use]
    pub fn is_typing(self) -> bool {
        matches!(self, TypingSignal::Start)
    }

    /// Extract the signal from a client event, if it is one.
    #[must_use]
    pub fn from_event(event: &ClientEvent) -> Option<Self> {
        match event {
            ClientEvent::TypingStart(_) => Some(TypingSignal::Start),
            ClientEvent::TypingEnd(_) => Some(TypingSignal::End),
            _ => None,
        }
    }
}

/// Apply a signal to a room.
///
/// Returns `true` if the participant is a member and the signal was
/// recorded; non-members are ignored.
pub fn apply(room: &mut DocumentRoom, participant_id: &str, signal: TypingSignal) -> bool {
    let applied = room.set_typing(participant_id, signal.is_typing());
    trace!(
        document = %room.document_id(),
        participant = %participant_id,
        ?signal,
        applied,
        "Typing signal"
    );
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::Outbox;
    use crate::participant::{Identity, Participant};

    #[test]
    fn test_start_then_end() {
        let mut room = DocumentRoom::new("doc1");
        let (outbox, _inbox) = Outbox::channel("conn-a");
        room.upsert(Participant::new(&Identity::new("a", "A")), outbox);

        assert!(apply(&mut room, "a", TypingSignal::Start));
        assert!(room.participant("a").unwrap().is_typing);

        assert!(apply(&mut room, "a", TypingSignal::End));
        assert!(!room.participant("a").unwrap().is_typing);
    }

    #[test]
    fn test_non_member_is_ignored() {
        let mut room = DocumentRoom::new("doc1");
        assert!(!apply(&mut room, "ghost", TypingSignal::Start));
        assert!(room.is_empty());
    }

    #[test]
    fn test_signal_from_event() {
        assert_eq!(
            TypingSignal::from_event(&ClientEvent::TypingStart("d".into())),
            Some(TypingSignal::Start)
        );
        assert_eq!(
            TypingSignal::from_event(&ClientEvent::TypingEnd("d".into())),
            Some(TypingSignal::End)
        );
        assert_eq!(
            TypingSignal::from_event(&ClientEvent::JoinDocument("d".into())),
            None
        );
    }
}
