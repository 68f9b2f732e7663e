//! The relay event handler.
//!
//! `RelayService::handle` runs on the event loop for every inbound message.
//! Recording and commands happen inline so turns land in arrival order. A
//! message that addresses the bot yields a [`PendingReply`], which the loop
//! spawns so the AI call never stalls intake.

use std::sync::Arc;

use chatrelay_types::chat::{ChannelId, Turn};
use chatrelay_types::event::InboundMessage;
use chatrelay_types::llm::AiError;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::llm::AiBackend;
use crate::logging::LogControl;
use crate::persist::SnapshotStore;
use crate::platform::{truncate_for_platform, ChatPlatform};
use crate::relay::commands::{help_text, Command};
use crate::state::StateManager;

/// Reply sent when the AI backend fails. Details stay in the logs.
pub const APOLOGY: &str = "Sorry, I couldn't come up with a reply just now. Please try again in a moment.";

/// Relay behavior fixed at startup.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub command_prefix: String,
    pub max_message_len: usize,
    /// Injected once per channel when its session is created.
    pub system_instruction: String,
}

/// Routes inbound messages to history, commands, and the AI backend.
pub struct RelayService<St, B: AiBackend, P> {
    state: Arc<StateManager<St, B::Session>>,
    backend: Arc<B>,
    platform: Arc<P>,
    log_control: Option<Arc<dyn LogControl>>,
    settings: RelaySettings,
    in_flight: DashMap<ChannelId, Arc<Mutex<()>>>,
}

impl<St, B, P> RelayService<St, B, P>
where
    St: SnapshotStore,
    B: AiBackend,
    P: ChatPlatform,
{
    pub fn new(
        state: Arc<StateManager<St, B::Session>>,
        backend: Arc<B>,
        platform: Arc<P>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            state,
            backend,
            platform,
            log_control: None,
            settings,
            in_flight: DashMap::new(),
        }
    }

    /// Enable the `loglevel` command.
    pub fn with_log_control(mut self, control: Arc<dyn LogControl>) -> Self {
        self.log_control = Some(control);
        self
    }

    pub fn state(&self) -> &Arc<StateManager<St, B::Session>> {
        &self.state
    }

    /// Outbound limit: the smaller of the configured and platform limits.
    fn max_len(&self) -> usize {
        self.settings
            .max_message_len
            .min(self.platform.max_message_len())
    }

    /// Handle one inbound message.
    ///
    /// Returns the AI reply still to be produced, if the message asked for
    /// one. Never fails; problems are logged or answered in the channel.
    pub async fn handle(self: &Arc<Self>, message: InboundMessage) -> Option<PendingReply<St, B, P>> {
        if message.is_from_self {
            return None;
        }
        let channel = message.channel();

        if let Some(command) = Command::parse(&message.content, &self.settings.command_prefix) {
            tracing::debug!(channel = %channel, ?command, "command received");
            self.run_command(&channel, command).await;
            return None;
        }

        let turns = self
            .state
            .append_user(
                &channel,
                &message.author_id,
                &message.author_name,
                &message.content,
                message.timestamp,
            )
            .await;
        self.state.request_save();
        tracing::debug!(channel = %channel, turns, "user turn recorded");

        if !message.mentions_bot {
            return None;
        }
        tracing::info!(channel = %channel, author = %message.author_name, "bot addressed");
        Some(PendingReply {
            service: Arc::clone(self),
            channel,
            text: message.content,
        })
    }

    async fn run_command(&self, channel: &ChannelId, command: Command) {
        let prefix = &self.settings.command_prefix;
        let reply = match command {
            // The write runs on the save task; intake does not wait for disk.
            Command::Reset => {
                let had_history = self.state.forget_channel(channel).await;
                self.state.save_now();
                self.release_channel_lock(channel);
                if had_history {
                    "Conversation reset.".to_string()
                } else {
                    "Nothing to reset here.".to_string()
                }
            }
            Command::History { count } => {
                let turns = self.state.recent_turns(channel, count).await;
                format_history(&turns)
            }
            Command::LogLevel { directive } => self.log_level(directive.as_deref()),
            Command::Help => help_text(prefix),
            Command::Unknown(name) => format!("Unknown command '{name}'. Try {prefix}help."),
        };
        self.deliver(channel, &reply).await;
    }

    fn log_level(&self, directive: Option<&str>) -> String {
        let Some(control) = &self.log_control else {
            return "Log level control is not available.".to_string();
        };
        match directive {
            None => format!("Current log level: {}", control.current_level()),
            Some(directive) => match control.set_level(directive) {
                Ok(()) => {
                    tracing::info!(directive, "log level changed from chat");
                    format!("Log level set to {directive}.")
                }
                Err(e) => format!("Could not set log level: {e}"),
            },
        }
    }

    /// Truncate and send. Returns the text the channel actually received.
    async fn deliver(&self, channel: &ChannelId, text: &str) -> Option<String> {
        let text = truncate_for_platform(text, self.max_len());
        match self.platform.send(channel, &text).await {
            Ok(()) => Some(text.into_owned()),
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "failed to send message");
                None
            }
        }
    }

    fn channel_lock(&self, channel: &ChannelId) -> Arc<Mutex<()>> {
        Arc::clone(self.in_flight.entry(channel.clone()).or_default().value())
    }

    /// Drop the channel's lock entry unless a reply still holds or awaits it.
    fn release_channel_lock(&self, channel: &ChannelId) {
        self.in_flight
            .remove_if(channel, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Generate, send, and record one reply. Caller holds the channel lock.
    async fn reply(&self, channel: &ChannelId, text: &str) {
        let reply = match self.generate(channel, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    backend = self.backend.name(),
                    error = %e,
                    "reply generation failed"
                );
                self.deliver(channel, APOLOGY).await;
                return;
            }
        };

        let Some(sent) = self.deliver(channel, &reply).await else {
            tracing::warn!(channel = %channel, "reply not delivered, not recorded");
            return;
        };

        let turns = self.state.append_bot(channel, &sent).await;
        self.state.request_save();
        tracing::debug!(channel = %channel, turns, "bot turn recorded");
    }

    async fn generate(&self, channel: &ChannelId, text: &str) -> Result<String, AiError> {
        let session = self
            .state
            .sessions()
            .ensure(channel, || {
                self.backend
                    .create_session(&self.settings.system_instruction)
            })
            .await
            .map_err(|e| AiError::Provider {
                message: e.to_string(),
            })?;

        let reply = self.backend.send_message(&session, text).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(reply.to_string())
    }
}

/// An AI reply still to be generated and sent.
pub struct PendingReply<St, B: AiBackend, P> {
    service: Arc<RelayService<St, B, P>>,
    channel: ChannelId,
    text: String,
}

impl<St, B, P> PendingReply<St, B, P>
where
    St: SnapshotStore,
    B: AiBackend,
    P: ChatPlatform,
{
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Generate the reply, send it, and record it.
    ///
    /// Holds the channel's in-flight lock throughout, so at most one AI call
    /// per channel runs at a time. The bot turn is recorded only after the
    /// platform accepted it.
    pub async fn run(self) {
        let service = self.service;
        let channel = self.channel;

        let lock = service.channel_lock(&channel);
        {
            let _guard = lock.lock().await;
            service.reply(&channel, &self.text).await;
        }
        drop(lock);
        service.release_channel_lock(&channel);
    }
}

fn format_history(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "No history for this channel yet.".to_string();
    }
    turns
        .iter()
        .map(|turn| {
            let who = match &turn.author_name {
                Some(name) if !turn.is_bot() => name.as_str(),
                _ => "bot",
            };
            format!(
                "[{}] {}: {}",
                turn.timestamp.format("%Y-%m-%d %H:%M"),
                who,
                turn.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::testing::{
        inbound, FakeBackend, FakeLogControl, MemorySnapshotStore, RecordingPlatform,
    };
    use std::time::Duration;

    type Service = RelayService<MemorySnapshotStore, FakeBackend, RecordingPlatform>;

    struct Harness {
        service: Arc<Service>,
        backend: Arc<FakeBackend>,
        platform: Arc<RecordingPlatform>,
        store: MemorySnapshotStore,
    }

    fn harness_with(backend: FakeBackend, max_len: usize) -> Harness {
        harness_on(MemorySnapshotStore::new(), backend, max_len)
    }

    fn harness_on(store: MemorySnapshotStore, backend: FakeBackend, max_len: usize) -> Harness {
        let state = Arc::new(StateManager::new(
            store.clone(),
            HistoryStore::new(10),
            Duration::from_millis(750),
        ));
        let backend = Arc::new(backend);
        let platform = Arc::new(RecordingPlatform::new(max_len));
        let settings = RelaySettings {
            command_prefix: "!".to_string(),
            max_message_len: 2000,
            system_instruction: "You are Nyx.\n\nstories".to_string(),
        };
        let service = Arc::new(RelayService::new(
            state,
            Arc::clone(&backend),
            Arc::clone(&platform),
            settings,
        ));
        Harness {
            service,
            backend,
            platform,
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeBackend::new(), 2000)
    }

    fn ch(id: &str) -> ChannelId {
        ChannelId::new(id)
    }

    async fn ask(h: &Harness, channel: Option<&str>, text: &str) {
        let pending = h.service.handle(inbound(channel, text, true)).await;
        pending.expect("mention should produce a reply").run().await;
    }

    #[tokio::test]
    async fn test_own_messages_are_ignored() {
        let h = harness();
        let mut msg = inbound(Some("123"), "echo", true);
        msg.is_from_self = true;

        assert!(h.service.handle(msg).await.is_none());
        assert_eq!(h.service.state().turn_count(&ch("123")).await, 0);
        assert!(!h.service.state().save_pending());
    }

    #[tokio::test]
    async fn test_unaddressed_message_is_recorded_without_reply() {
        let h = harness();
        let pending = h.service.handle(inbound(Some("123"), "just chatting", false)).await;

        assert!(pending.is_none());
        assert_eq!(h.service.state().turn_count(&ch("123")).await, 1);
        assert!(h.service.state().save_pending());
        assert!(h.platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mention_produces_recorded_reply() {
        let h = harness();
        ask(&h, Some("123"), "hi bot").await;

        assert_eq!(h.platform.texts(), vec!["reply: hi bot"]);
        let turns = h.service.state().recent_turns(&ch("123"), 30).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "hi bot");
        assert!(turns[1].is_bot());
        assert_eq!(turns[1].content, "reply: hi bot");
    }

    #[tokio::test]
    async fn test_session_created_once_per_channel() {
        let h = harness();
        ask(&h, Some("123"), "one").await;
        ask(&h, Some("123"), "two").await;
        ask(&h, Some("456"), "three").await;

        assert_eq!(h.backend.sessions_created(), 2);
        let session = h.service.state().sessions().get(&ch("123")).unwrap();
        assert_eq!(session.system_instruction, "You are Nyx.\n\nstories");
    }

    #[tokio::test]
    async fn test_direct_messages_share_sentinel_channel() {
        let h = harness();
        ask(&h, None, "psst").await;

        assert_eq!(h.service.state().turn_count(&ch(ChannelId::DIRECT)).await, 2);
        assert_eq!(h.platform.sent()[0].channel, ch("direct"));
    }

    #[tokio::test]
    async fn test_ai_failure_sends_apology_and_records_nothing() {
        let h = harness();
        h.backend.script(Err(AiError::RateLimited));
        ask(&h, Some("123"), "hi").await;

        assert_eq!(h.platform.texts(), vec![APOLOGY]);
        let turns = h.service.state().recent_turns(&ch("123"), 30).await;
        assert_eq!(turns.len(), 1);
        assert!(!turns[0].is_bot());
    }

    #[tokio::test]
    async fn test_empty_reply_counts_as_failure() {
        let h = harness();
        h.backend.script(Ok("   \n".to_string()));
        ask(&h, Some("123"), "hi").await;

        assert_eq!(h.platform.texts(), vec![APOLOGY]);
        assert_eq!(h.service.state().turn_count(&ch("123")).await, 1);
    }

    #[tokio::test]
    async fn test_session_creation_failure_leaves_registry_empty() {
        let h = harness();
        h.backend.set_fail_create(true);
        ask(&h, Some("123"), "hi").await;

        assert_eq!(h.platform.texts(), vec![APOLOGY]);
        assert!(h.service.state().sessions().is_empty());
    }

    #[tokio::test]
    async fn test_undelivered_reply_is_not_recorded() {
        let h = harness();
        h.platform.set_fail_sends(true);
        ask(&h, Some("123"), "hi").await;

        let turns = h.service.state().recent_turns(&ch("123"), 30).await;
        assert_eq!(turns.len(), 1);
        assert!(!turns[0].is_bot());
    }

    #[tokio::test]
    async fn test_long_reply_truncated_and_recorded_as_sent() {
        let h = harness_with(FakeBackend::new(), 12);
        h.backend.script(Ok("x".repeat(50)));
        ask(&h, Some("123"), "go").await;

        let sent = h.platform.texts();
        assert_eq!(sent[0].chars().count(), 12);
        assert!(sent[0].ends_with('…'));
        let turns = h.service.state().recent_turns(&ch("123"), 30).await;
        assert_eq!(turns[1].content, sent[0]);
    }

    #[tokio::test]
    async fn test_commands_are_not_recorded() {
        let h = harness();
        assert!(h.service.handle(inbound(Some("123"), "!history", false)).await.is_none());

        assert_eq!(h.service.state().turn_count(&ch("123")).await, 0);
        assert_eq!(h.platform.texts(), vec!["No history for this channel yet."]);
    }

    #[tokio::test]
    async fn test_history_command_lists_recent_turns() {
        let h = harness();
        h.service.handle(inbound(Some("123"), "first", false)).await;
        h.service.handle(inbound(Some("123"), "second", false)).await;
        h.service.handle(inbound(Some("123"), "third", false)).await;

        h.service.handle(inbound(Some("123"), "!history 2", false)).await;

        let listing = h.platform.texts().pop().unwrap();
        assert!(!listing.contains("first"));
        assert!(listing.contains("ada: second"));
        assert!(listing.contains("ada: third"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_command_clears_channel() {
        let h = harness();
        ask(&h, Some("123"), "hi").await;
        ask(&h, Some("456"), "hello").await;
        assert_eq!(h.store.writes(), 0);

        h.service.handle(inbound(Some("123"), "!reset", false)).await;

        assert_eq!(h.service.state().turn_count(&ch("123")).await, 0);
        assert!(h.service.state().sessions().get(&ch("123")).is_none());
        assert_eq!(h.service.state().turn_count(&ch("456")).await, 2);
        assert_eq!(h.platform.texts().last().unwrap(), "Conversation reset.");

        // Saved right away, well before the debounce interval.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.store.writes(), 1);
        let saved = crate::persist::codec::decode(&h.store.contents().unwrap()).unwrap();
        assert!(!saved.contains_key("123"));
        assert_eq!(saved["456"].len(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.store.writes(), 1);
    }

    #[tokio::test]
    async fn test_reset_of_empty_channel() {
        let h = harness();
        h.service.handle(inbound(Some("123"), "!reset", false)).await;
        assert_eq!(h.platform.texts(), vec!["Nothing to reset here."]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_does_not_wait_for_disk() {
        let store = MemorySnapshotStore::slow(Duration::from_millis(500));
        let h = harness_on(store, FakeBackend::new(), 2000);
        h.service.handle(inbound(Some("123"), "hi", false)).await;

        let started = tokio::time::Instant::now();
        h.service.handle(inbound(Some("123"), "!reset", false)).await;
        h.service.handle(inbound(Some("123"), "next", false)).await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(h.service.state().turn_count(&ch("123")).await, 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(h.store.max_concurrent_writes(), 1);
        let saved = crate::persist::codec::decode(&h.store.contents().unwrap()).unwrap();
        assert_eq!(saved["123"].len(), 1);
        assert_eq!(saved["123"][0].content, "next");
    }

    #[tokio::test]
    async fn test_channel_locks_released_after_replies() {
        let h = harness();
        ask(&h, Some("123"), "one").await;
        ask(&h, Some("456"), "two").await;
        h.backend.script(Err(AiError::RateLimited));
        ask(&h, Some("789"), "three").await;

        assert!(h.service.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_loglevel_command() {
        let h = harness();
        let control = Arc::new(FakeLogControl::new("info"));
        let service = Arc::new(
            RelayService::new(
                Arc::clone(h.service.state()),
                Arc::clone(&h.backend),
                Arc::clone(&h.platform),
                h.service.settings.clone(),
            )
            .with_log_control(control.clone()),
        );

        service.handle(inbound(Some("1"), "!loglevel debug", false)).await;
        assert_eq!(control.current_level(), "debug");
        service.handle(inbound(Some("1"), "!loglevel", false)).await;

        let texts = h.platform.texts();
        assert_eq!(texts[0], "Log level set to debug.");
        assert_eq!(texts[1], "Current log level: debug");
    }

    #[tokio::test]
    async fn test_loglevel_without_control() {
        let h = harness();
        h.service.handle(inbound(Some("1"), "!loglevel trace", false)).await;
        assert_eq!(h.platform.texts(), vec!["Log level control is not available."]);
    }

    #[tokio::test]
    async fn test_unknown_command_hint() {
        let h = harness();
        h.service.handle(inbound(Some("1"), "!dance", false)).await;
        assert_eq!(h.platform.texts(), vec!["Unknown command 'dance'. Try !help."]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_ai_call_per_channel_at_a_time() {
        let h = harness_with(FakeBackend::slow(Duration::from_millis(200)), 2000);
        let a = h.service.handle(inbound(Some("123"), "a", true)).await.unwrap();
        let b = h.service.handle(inbound(Some("123"), "b", true)).await.unwrap();

        tokio::join!(a.run(), b.run());

        assert_eq!(h.backend.max_concurrent_calls(), 1);
        assert_eq!(h.backend.sessions_created(), 1);
        assert_eq!(h.service.state().turn_count(&ch("123")).await, 4);
        assert!(h.service.in_flight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_channels_reply_independently() {
        let h = harness_with(FakeBackend::slow(Duration::from_millis(200)), 2000);
        let a = h.service.handle(inbound(Some("123"), "a", true)).await.unwrap();
        let b = h.service.handle(inbound(Some("456"), "b", true)).await.unwrap();

        tokio::join!(a.run(), b.run());

        assert_eq!(h.backend.max_concurrent_calls(), 2);
    }
}
