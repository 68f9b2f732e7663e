//! AI backend error type.
//!
//! The relay surfaces every variant to chat users as the same short apology;
//! the detail only reaches the logs.

/// Errors from AI backend operations.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("rate limited")]
    RateLimited,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("empty response from model")]
    EmptyResponse,
}
