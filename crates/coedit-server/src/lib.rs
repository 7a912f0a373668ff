//! # coedit-server
//!
//! Realtime document session coordinator.
//!
//! Clients connect over WebSocket with a signed token, join the documents
//! they have open, and receive presence snapshots, typing indicators and
//! other viewers' edits for those documents.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod session;

pub use config::Config;
pub use handlers::{app, run_server, serve, AppState};
