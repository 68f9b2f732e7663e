//! Infrastructure layer for chatrelay.
//!
//! Contains implementations of the port traits defined in `chatrelay-core`:
//! the atomic snapshot file store, the Gemini REST backend, and the console
//! chat platform. Also loads startup configuration, prompt sources, and the
//! API credential.

pub mod config;
pub mod llm;
pub mod platform;
pub mod prompt;
pub mod secret;
pub mod storage;
