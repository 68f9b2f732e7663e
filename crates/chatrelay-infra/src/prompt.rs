//! System instruction sources.
//!
//! The instruction is the persona file followed by the stories file. Both
//! must exist; a missing source aborts startup.

use std::path::Path;

use chatrelay_core::prompt::build_system_instruction;
use chatrelay_types::config::RelayConfig;
use chatrelay_types::error::ConfigError;

use crate::config::resolve_in;

/// Read both prompt sources and join them.
pub async fn load_system_instruction(
    data_dir: &Path,
    config: &RelayConfig,
) -> Result<String, ConfigError> {
    let system = read_source(&resolve_in(data_dir, &config.system_prompt_path)).await?;
    let stories = read_source(&resolve_in(data_dir, &config.stories_path)).await?;

    tracing::debug!(
        system_chars = system.chars().count(),
        stories_chars = stories.chars().count(),
        "loaded system instruction sources"
    );
    Ok(build_system_instruction(&system, &stories))
}

async fn read_source(path: &Path) -> Result<String, ConfigError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::MissingPromptSource {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
