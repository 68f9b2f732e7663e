//! Channel and conversation turn types for chatrelay.
//!
//! A channel is the scope of shared conversation memory. Every message seen
//! in a channel is recorded as a [`Turn`], in arrival order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Identifier of a conversation scope.
///
/// Derived from the platform channel ID. Contexts without a channel ID
/// (direct messages) share the reserved [`ChannelId::DIRECT`] key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Reserved key for contexts that carry no platform channel ID.
    pub const DIRECT: &'static str = "direct";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Map an optional platform channel ID to a channel key.
    pub fn from_platform(id: Option<&str>) -> Self {
        match id {
            Some(id) if !id.trim().is_empty() => Self(id.to_string()),
            _ => Self(Self::DIRECT.to_string()),
        }
    }

    /// Whether this is the direct-message sentinel.
    pub fn is_direct(&self) -> bool {
        self.0 == Self::DIRECT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Bot,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Bot => write!(f, "bot"),
        }
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(TurnRole::User),
            "bot" => Ok(TurnRole::Bot),
            other => Err(format!("invalid turn role: '{other}'")),
        }
    }
}

/// One recorded utterance in a channel.
///
/// User turns carry the author's platform ID and display name; bot turns
/// leave both empty. Turns are never edited after they are appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

impl Turn {
    /// A turn authored by a platform user.
    pub fn user(
        author_id: impl Into<String>,
        author_name: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp,
            author_id: Some(author_id.into()),
            author_name: Some(author_name.into()),
        }
    }

    /// A turn produced by the bot, stamped with the current UTC time.
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Bot,
            content: content.into(),
            timestamp: Utc::now(),
            author_id: None,
            author_name: None,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.role == TurnRole::Bot
    }
}
