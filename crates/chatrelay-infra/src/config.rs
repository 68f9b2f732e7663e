//! Startup configuration for chatrelay.
//!
//! Reads `config.toml` from the data directory (`~/.chatrelay/` by default)
//! and deserializes it into [`RelayConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use chatrelay_types::config::RelayConfig;
use chatrelay_types::error::ConfigError;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "CHATRELAY_DATA_DIR";

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_config(data_dir: &Path) -> RelayConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return RelayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            RelayConfig::default()
        }
    }
}

/// Reject settings the relay cannot run with.
pub fn validate(config: &RelayConfig) -> Result<(), ConfigError> {
    if config.model.trim().is_empty() {
        return Err(ConfigError::Invalid("model must not be empty".to_string()));
    }
    if config.max_history_turns == 0 {
        return Err(ConfigError::Invalid(
            "max_history_turns must be at least 1".to_string(),
        ));
    }
    if config.max_message_len < 2 {
        return Err(ConfigError::Invalid(
            "max_message_len must be at least 2".to_string(),
        ));
    }
    if config.command_prefix.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "command_prefix must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CHATRELAY_DATA_DIR` environment variable
/// 2. `~/.chatrelay`
/// 3. `.chatrelay` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var(DATA_DIR_ENV).ok(), dirs::home_dir())
}

fn data_dir_from(env_value: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env_value.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(home) = home {
        return home.join(".chatrelay");
    }
    PathBuf::from(".chatrelay")
}

/// Resolve a configured path against the data directory.
pub fn resolve_in(data_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}
