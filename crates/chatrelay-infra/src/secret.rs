//! API credential lookup.
//!
//! The AI backend key comes from an environment variable named in the
//! config. A missing or blank key aborts startup.

use chatrelay_types::error::ConfigError;
use secrecy::SecretString;

/// Read the API key from the environment variable `env_key`.
pub fn resolve_api_key(env_key: &str) -> Result<SecretString, ConfigError> {
    // Non-Unicode values are treated as absent; keys must be valid strings.
    api_key_from(env_key, std::env::var(env_key).ok())
}

fn api_key_from(env_key: &str, value: Option<String>) -> Result<SecretString, ConfigError> {
    match value.map(|v| v.trim().to_string()) {
        Some(key) if !key.is_empty() => Ok(SecretString::from(key)),
        _ => Err(ConfigError::MissingCredential(env_key.to_string())),
    }
}
