//! State manager: owns the conversation state and its persistence.
//!
//! `StateManager` is the single owner of the history store, the session
//! registry, and the snapshot store. Event handlers reach state only through
//! it, so locking is explicit: history sits behind an async `RwLock`, saves
//! are serialized by a dedicated mutex, and debounced saves go through one
//! [`SaveScheduler`].

use std::sync::Arc;
use std::time::Duration;

use chatrelay_types::chat::{ChannelId, Turn};
use chatrelay_types::error::PersistError;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::history::HistoryStore;
use crate::persist::codec;
use crate::persist::scheduler::{Persist, SaveScheduler};
use crate::persist::SnapshotStore;
use crate::session::{AiSession, SessionRegistry};

/// What `load` found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No snapshot existed; starting empty.
    Fresh,
    /// Snapshot restored (after clamping).
    Loaded { channels: usize, turns: usize },
    /// Snapshot unreadable or malformed; starting empty.
    Recovered { reason: String },
}

/// Conversation state plus its durable snapshot.
pub struct StateManager<St, S> {
    history: RwLock<HistoryStore>,
    sessions: SessionRegistry<S>,
    store: St,
    save_lock: Mutex<()>,
    scheduler: SaveScheduler,
}

impl<St: SnapshotStore, S: AiSession> StateManager<St, S> {
    pub fn new(store: St, history: HistoryStore, debounce: Duration) -> Self {
        Self {
            history: RwLock::new(history),
            sessions: SessionRegistry::new(),
            store,
            save_lock: Mutex::new(()),
            scheduler: SaveScheduler::new(debounce),
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry<S> {
        &self.sessions
    }

    /// Replace in-memory history with the stored snapshot.
    ///
    /// Never fails: unreadable or malformed snapshots are logged and the
    /// relay starts with empty history.
    pub async fn load(&self) -> LoadOutcome {
        let location = self.store.location();

        let decoded = match self.store.read().await {
            Ok(None) => {
                self.history.write().await.clear();
                tracing::info!(path = %location, "no snapshot found, starting fresh");
                return LoadOutcome::Fresh;
            }
            Ok(Some(bytes)) => codec::decode(&bytes),
            Err(e) => Err(e),
        };

        let mut history = self.history.write().await;
        match decoded {
            Ok(channels) => {
                history.replace_all(channels);
                let channels = history.channel_count();
                let turns = history.total_turns();
                tracing::info!(path = %location, channels, turns, "snapshot loaded");
                LoadOutcome::Loaded { channels, turns }
            }
            Err(e) => {
                history.clear();
                tracing::warn!(
                    path = %location,
                    error = %e,
                    "failed to load snapshot, starting with empty history"
                );
                LoadOutcome::Recovered {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Write the current history to the snapshot store.
    ///
    /// Saves are serialized. History is only locked long enough to copy it
    /// out. A failure is logged and returned; state stays in memory and the
    /// next save tries again.
    pub async fn save(&self) -> Result<(), PersistError> {
        let _guard = self.save_lock.lock().await;

        let snapshot = self.history.read().await.snapshot();
        let channels = snapshot.len();

        let result = match codec::encode(snapshot) {
            Ok(bytes) => {
                let len = bytes.len();
                self.store.write(bytes).await.map(|()| len)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                tracing::debug!(path = %self.store.location(), channels, bytes, "snapshot saved");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %self.store.location(), error = %e, "snapshot save failed");
                Err(e)
            }
        }
    }

    /// Ask for a save once mutations have been quiet for the debounce interval.
    pub fn request_save(self: &Arc<Self>) {
        self.scheduler.request(Arc::clone(self));
    }

    /// Ask for a save right away without waiting for it. Shares the
    /// debounce task, so it never overlaps another save.
    pub fn save_now(self: &Arc<Self>) {
        self.scheduler.request_now(Arc::clone(self));
    }

    /// Whether a debounced save is scheduled or running.
    pub fn save_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Record a user turn. Returns the channel's length afterwards.
    pub async fn append_user(
        &self,
        channel: &ChannelId,
        author_id: &str,
        author_name: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> usize {
        self.history
            .write()
            .await
            .append_user(channel, author_id, author_name, content, timestamp)
    }

    /// Record a bot turn stamped now. Returns the channel's length afterwards.
    pub async fn append_bot(&self, channel: &ChannelId, content: &str) -> usize {
        self.history.write().await.append_bot(channel, content)
    }

    /// The last `n` turns of a channel for display.
    pub async fn recent_turns(&self, channel: &ChannelId, n: usize) -> Vec<Turn> {
        self.history.read().await.recent(channel, n)
    }

    pub async fn turn_count(&self, channel: &ChannelId) -> usize {
        self.history.read().await.len(channel)
    }

    /// Drop a channel's history and live session from memory. Returns
    /// whether the channel had any history. Does not save.
    pub async fn forget_channel(&self, channel: &ChannelId) -> bool {
        let had_history = self.history.write().await.reset(channel);
        let had_session = self.sessions.remove(channel).await;

        tracing::info!(channel = %channel, had_history, had_session, "channel reset");
        had_history
    }

    /// Forget a channel, then save and wait for the write.
    ///
    /// History and session are gone even if the save fails.
    pub async fn reset_channel(&self, channel: &ChannelId) -> Result<bool, PersistError> {
        let had_history = self.forget_channel(channel).await;
        self.save().await?;
        Ok(had_history)
    }

    /// Settle the debounce timer and write one final snapshot.
    pub async fn shutdown(&self) -> Result<(), PersistError> {
        self.scheduler.close().await;
        self.save().await
    }
}

impl<St: SnapshotStore, S: AiSession> Persist for StateManager<St, S> {
    async fn persist(&self) {
        // Failure is already logged by save().
        let _ = self.save().await;
    }
}
