//! Relay configuration types.
//!
//! `RelayConfig` represents the `config.toml` in the data directory. It is
//! loaded once at startup; every field has a default so an absent or empty
//! file yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File name of the snapshot when no explicit path is configured.
pub const DEFAULT_SNAPSHOT_FILE: &str = "state.json";

/// Top-level configuration for the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Model identifier passed to the AI backend.
    pub model: String,

    /// Base URL of the AI backend REST API.
    pub api_base_url: String,

    /// Name of the environment variable holding the AI backend API key.
    pub api_key_env: String,

    /// Upper bound on turns kept per channel.
    pub max_history_turns: usize,

    /// Quiet interval before a requested save is written.
    pub debounce_ms: u64,

    /// Snapshot file location. Defaults to `<data_dir>/state.json`.
    pub snapshot_path: Option<PathBuf>,

    /// First system-instruction source (persona / rules).
    pub system_prompt_path: PathBuf,

    /// Second system-instruction source (background stories).
    pub stories_path: PathBuf,

    /// Prefix that marks a chat message as a command.
    pub command_prefix: String,

    /// Platform limit on a single outbound message, in characters.
    pub max_message_len: usize,

    /// Upper bound for the `history` command's turn count.
    pub recent_turns_max: usize,
}

impl RelayConfig {
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Resolve the snapshot path against the data directory.
    pub fn snapshot_path_in(&self, data_dir: &Path) -> PathBuf {
        match &self.snapshot_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => data_dir.join(path),
            None => data_dir.join(DEFAULT_SNAPSHOT_FILE),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_history_turns: 10,
            debounce_ms: 750,
            snapshot_path: None,
            system_prompt_path: PathBuf::from("system.txt"),
            stories_path: PathBuf::from("all_stories.txt"),
            command_prefix: "!".to_string(),
            max_message_len: 2000,
            recent_turns_max: 30,
        }
    }
}
