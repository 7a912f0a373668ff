//! # coedit-core
//!
//! Ephemeral session state for collaborative document editing.
//!
//! This crate provides the building blocks of the session coordinator:
//!
//! - **Identity** - verify a connection's credential and resolve its display name
//! - **Registry** - which participants are viewing which document
//! - **Typing** - per-participant typing flags, driven by client signals
//! - **Presence** - full-snapshot membership broadcasts
//! - **Relay** - forward edits to the rest of a room
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Identity   │────▶│  Registry   │────▶│    Room     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │                   │
//!                            ▼                   ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │  Presence   │     │   Outbox    │
//!                     │ Typing/Relay│     │ (per conn)  │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! Nothing here is persisted. A restart forgets every room.

pub mod identity;
pub mod outbox;
pub mod participant;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod room;
pub mod typing;

pub use identity::{
    AuthError, HttpProfileLookup, IdentityGate, NoProfileLookup, ProfileError, ProfileLookup,
};
pub use outbox::{Inbox, Outbox};
pub use participant::{Identity, Participant, ParticipantId};
pub use registry::{RegistryStats, SessionRegistry};
pub use room::DocumentRoom;
pub use typing::TypingSignal;
