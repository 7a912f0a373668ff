//! Edit relay.
//!
//! Edits are forwarded as-is to the other members of a room, tagged with
//! the sender's identity. Nothing is merged or reordered: concurrent edits
//! from two members both go out, and each receiver applies what it gets.

use crate::room::DocumentRoom;
use coedit_protocol::ServerEvent;

/// Forward `changes` from `sender_id` to the rest of the room.
///
/// Returns `None` if the sender is not a member, otherwise the number of
/// members the edit was queued for.
pub fn relay(room: &DocumentRoom, sender_id: &str, changes: serde_json::Value) -> Option<usize> {
    let sender = room.participant(sender_id)?;

    let event = ServerEvent::DocumentChanged {
        document_id: room.document_id().to_string(),
        changes,
        user_id: sender.id.clone(),
        user_name: sender.display_name.clone(),
    };

    Some(room.broadcast_except(sender_id, event))
}
