use thiserror::Error;

/// Errors from reading or writing the state snapshot.
///
/// None of these are fatal to the relay: a failed load starts fresh and a
/// failed save leaves state in memory until the next save attempt.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("malformed snapshot: {0}")]
    Decode(String),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("background write task failed: {0}")]
    Join(String),
}

/// Errors from the per-channel session registry.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session creation failed: {0}")]
    CreationFailed(String),
}

/// Errors from the chat platform collaborator.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to send to channel '{channel}': {reason}")]
    Send { channel: String, reason: String },

    #[error("platform connection closed")]
    Closed,
}

/// Startup configuration errors. These abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: environment variable '{0}' is not set")]
    MissingCredential(String),

    #[error("missing prompt source '{path}': {reason}")]
    MissingPromptSource { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
