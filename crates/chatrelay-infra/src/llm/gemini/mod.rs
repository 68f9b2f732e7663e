//! Google Gemini backend over the `generateContent` REST endpoint.

pub mod client;
pub mod types;

pub use client::{GeminiBackend, GeminiSession};
