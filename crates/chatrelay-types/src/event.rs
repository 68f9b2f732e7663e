//! Messages received from the chat platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChannelId;

/// A message received from the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform channel ID; `None` for direct-message contexts.
    pub channel_id: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the relay's own account sent this message.
    pub is_from_self: bool,
    /// Set when the message addresses the bot (mention or DM).
    pub mentions_bot: bool,
}

impl InboundMessage {
    /// The conversation scope this message belongs to.
    pub fn channel(&self) -> ChannelId {
        ChannelId::from_platform(self.channel_id.as_deref())
    }
}
