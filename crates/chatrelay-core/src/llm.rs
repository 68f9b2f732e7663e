//! AiBackend trait definition.
//!
//! The AI backend is a stateful-conversation service: a session is created
//! once with a system instruction, then messages are sent through it and
//! the backend keeps the conversation context.
//!
//! Implementations live in chatrelay-infra (e.g., `GeminiBackend`).
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use chatrelay_types::llm::AiError;

use crate::session::AiSession;

/// Trait for AI conversation backends.
pub trait AiBackend: Send + Sync + 'static {
    /// Live conversation handle type stored in the session registry.
    type Session: AiSession;

    /// Human-readable backend name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Open a new conversation seeded with `system_instruction`.
    fn create_session(
        &self,
        system_instruction: &str,
    ) -> impl std::future::Future<Output = Result<Self::Session, AiError>> + Send;

    /// Send one user message through a session and return the reply text.
    fn send_message(
        &self,
        session: &Self::Session,
        text: &str,
    ) -> impl std::future::Future<Output = Result<String, AiError>> + Send;
}
