//! # coedit-protocol
//!
//! Wire vocabulary for the Coedit realtime session coordinator.
//!
//! Every message on the socket is an envelope of the form
//! `{"event": <name>, "data": <payload>}`. Clients speak [`ClientEvent`]s,
//! the server answers with [`ServerEvent`]s.
//!
//! ## Encodings
//!
//! - **JSON** - text frames, what browsers send by default
//! - **MessagePack** - binary frames with a 4-byte big-endian length prefix
//!
//! ## Example
//!
//! ```rust
//! use coedit_protocol::{codec, ClientEvent};
//!
//! let event = ClientEvent::JoinDocument("doc1".into());
//!
//! let text = codec::encode_json(&event).unwrap();
//! assert_eq!(text, r#"{"event":"join-document","data":"doc1"}"#);
//!
//! let decoded: ClientEvent = codec::decode_json(&text).unwrap();
//! assert_eq!(decoded, event);
//! ```

pub mod codec;
pub mod events;
pub mod version;

pub use codec::{decode, encode, Encoding, Payload, ProtocolError};
pub use events::{
    error_codes, validate_document_id, ClientEvent, DocumentChange, DocumentId, PresenceEntry,
    PresenceSnapshot, ServerEvent,
};
pub use version::{Version, VersionError, PROTOCOL_VERSION};
