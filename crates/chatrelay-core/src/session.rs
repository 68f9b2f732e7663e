//! Live AI session registry.
//!
//! Maps each channel to one live conversation handle on the AI backend.
//! Handles are created lazily on the first message that addresses the bot,
//! dropped on reset, and never persisted: after a restart the registry is
//! empty and sessions are recreated with only the system instruction.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chatrelay_types::chat::ChannelId;
use chatrelay_types::error::SessionError;
use chatrelay_types::llm::AiError;
use dashmap::DashMap;

/// A live conversation handle held by the registry.
///
/// Handles are memory-managed. A backend whose sessions hold remote
/// resources exposes them through [`AiSession::closer`].
pub trait AiSession: Send + Sync + 'static {
    /// Teardown capability, if this handle has one.
    fn closer(&self) -> Option<&dyn CloseSession> {
        None
    }
}

/// Explicit teardown for session handles that own remote resources.
///
/// Object-safe (boxed future) so it can be returned from [`AiSession::closer`].
pub trait CloseSession: Send + Sync {
    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), AiError>> + Send + '_>>;
}

/// Channel to live session mapping.
pub struct SessionRegistry<S> {
    sessions: DashMap<ChannelId, Arc<S>>,
}

impl<S: AiSession> SessionRegistry<S> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Return the channel's session, creating it with `factory` if absent.
    ///
    /// A failing factory leaves the registry untouched.
    pub async fn ensure<F, Fut>(&self, channel: &ChannelId, factory: F) -> Result<Arc<S>, SessionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, AiError>>,
    {
        if let Some(existing) = self.get(channel) {
            return Ok(existing);
        }

        let session = factory()
            .await
            .map_err(|e| SessionError::CreationFailed(e.to_string()))?;

        tracing::debug!(channel = %channel, "created AI session");

        // Keep whichever handle landed first if two creations raced.
        let entry = self
            .sessions
            .entry(channel.clone())
            .or_insert_with(|| Arc::new(session));
        Ok(Arc::clone(entry.value()))
    }

    pub fn get(&self, channel: &ChannelId) -> Option<Arc<S>> {
        self.sessions.get(channel).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the channel's session. Returns whether one existed.
    ///
    /// Teardown runs only when the handle supports it, and its failure is
    /// logged and otherwise ignored.
    pub async fn remove(&self, channel: &ChannelId) -> bool {
        let Some((_, session)) = self.sessions.remove(channel) else {
            return false;
        };

        if let Some(closer) = session.closer() {
            if let Err(e) = closer.close().await {
                tracing::debug!(channel = %channel, error = %e, "session teardown failed");
            }
        }
        true
    }

    pub fn contains(&self, channel: &ChannelId) -> bool {
        self.sessions.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S: AiSession> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
