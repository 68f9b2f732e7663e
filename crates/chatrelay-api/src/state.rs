//! Application state wiring the relay together.
//!
//! AppState pins the generic core types to the concrete infra
//! implementations and is shared by the relay runner and the offline
//! snapshot commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chatrelay_core::history::HistoryStore;
use chatrelay_core::state::{LoadOutcome, StateManager};
use chatrelay_infra::config::{load_config, resolve_data_dir, validate};
use chatrelay_infra::llm::gemini::{GeminiBackend, GeminiSession};
use chatrelay_infra::prompt::load_system_instruction;
use chatrelay_infra::secret::resolve_api_key;
use chatrelay_infra::storage::AtomicFileStore;
use chatrelay_types::config::RelayConfig;

/// Concrete type alias for the state manager pinned to infra implementations.
pub type ConcreteStateManager = StateManager<AtomicFileStore, GeminiSession>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: RelayConfig,
    pub state: Arc<ConcreteStateManager>,
}

impl AppState {
    /// Read config and wire the state manager. Does not touch the snapshot.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        validate(&config)?;

        let snapshot_path = config.snapshot_path_in(&data_dir);
        let history = HistoryStore::new(config.max_history_turns)
            .with_recent_limit(config.recent_turns_max);
        let state = Arc::new(StateManager::new(
            AtomicFileStore::new(snapshot_path),
            history,
            config.debounce_interval(),
        ));

        Ok(Self {
            data_dir,
            config,
            state,
        })
    }

    /// Restore history from the snapshot. Never fails.
    pub async fn load_snapshot(&self) -> LoadOutcome {
        self.state.load().await
    }

    /// System instruction and AI backend. Missing prompt sources or a
    /// missing credential are fatal.
    pub async fn ai_backend(&self) -> anyhow::Result<(String, GeminiBackend)> {
        let instruction = load_system_instruction(&self.data_dir, &self.config).await?;
        let api_key = resolve_api_key(&self.config.api_key_env)?;
        let backend = GeminiBackend::new(api_key, self.config.model.clone())?
            .with_base_url(self.config.api_base_url.clone());
        Ok((instruction, backend))
    }
}
