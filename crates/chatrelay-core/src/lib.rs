//! Business logic and port trait definitions for chatrelay.
//!
//! This crate owns the conversation state (per-channel history and live AI
//! sessions), the debounced persistence scheduler, and the relay service that
//! turns inbound platform messages into AI calls. It defines the "ports"
//! (`SnapshotStore`, `AiBackend`, `ChatPlatform`, `LogControl`) that
//! `chatrelay-infra` implements, and depends only on `chatrelay-types`.

pub mod history;
pub mod llm;
pub mod logging;
pub mod persist;
pub mod platform;
pub mod prompt;
pub mod relay;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
