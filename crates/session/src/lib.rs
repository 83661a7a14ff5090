//! Session persistence for CodeClaw.
//!
//! Sessions are stored one JSON file per session under
//! `~/.codeclaw/sessions/`, named by their UUIDv7 id so a plain filename
//! sort is also a chronological sort.

pub mod store;

pub use store::{SessionFilter, SessionStore, SessionSummary};
