//! Shared domain types for chatrelay.
//!
//! This crate contains the types passed between the relay layers:
//! channels, conversation turns, inbound/outbound platform messages,
//! the persisted snapshot envelope, configuration, and error enums.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod snapshot;
