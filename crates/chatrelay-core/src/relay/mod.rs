//! Inbound message handling: commands and AI replies.

pub mod commands;
pub mod service;

pub use commands::Command;
pub use service::{PendingReply, RelayService, RelaySettings};
