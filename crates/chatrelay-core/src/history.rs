//! Per-channel conversation history with a hard size bound.
//!
//! Each channel keeps its turns in arrival order. After every mutation the
//! channel holds at most `max_turns` turns; the oldest are evicted first.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chatrelay_types::chat::{ChannelId, Turn};
use chrono::{DateTime, Utc};

/// Default upper bound for [`HistoryStore::recent`].
pub const DEFAULT_RECENT_LIMIT: usize = 30;

/// In-memory mapping of channel to its bounded turn sequence.
#[derive(Debug)]
pub struct HistoryStore {
    max_turns: usize,
    recent_limit: usize,
    channels: HashMap<ChannelId, VecDeque<Turn>>,
}

impl HistoryStore {
    /// Create an empty store. A bound of zero is raised to one.
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            recent_limit: DEFAULT_RECENT_LIMIT,
            channels: HashMap::new(),
        }
    }

    /// Set the upper bound for the `n` argument of [`HistoryStore::recent`].
    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit.max(1);
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Create an empty history for `channel` if it has none.
    pub fn ensure(&mut self, channel: &ChannelId) {
        self.channels.entry(channel.clone()).or_default();
    }

    /// Append a user turn and enforce the bound. Returns the channel length.
    pub fn append_user(
        &mut self,
        channel: &ChannelId,
        author_id: &str,
        author_name: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> usize {
        self.append(channel, Turn::user(author_id, author_name, content, timestamp))
    }

    /// Append a bot turn stamped now and enforce the bound.
    pub fn append_bot(&mut self, channel: &ChannelId, content: &str) -> usize {
        self.append(channel, Turn::bot(content))
    }

    fn append(&mut self, channel: &ChannelId, turn: Turn) -> usize {
        let max = self.max_turns;
        let turns = self.channels.entry(channel.clone()).or_default();
        turns.push_back(turn);
        evict_front(turns, max);
        turns.len()
    }

    /// Re-apply the size bound to one channel. Idempotent.
    pub fn trim(&mut self, channel: &ChannelId) {
        if let Some(turns) = self.channels.get_mut(channel) {
            evict_front(turns, self.max_turns);
        }
    }

    /// The last `n` turns of a channel, oldest first.
    ///
    /// `n` is clamped to `[1, recent_limit]`. Unknown channels yield nothing.
    pub fn recent(&self, channel: &ChannelId, n: usize) -> Vec<Turn> {
        let n = n.clamp(1, self.recent_limit);
        self.channels
            .get(channel)
            .map(|turns| {
                let skip = turns.len().saturating_sub(n);
                turns.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Drop a channel's history entirely. Returns whether it existed.
    pub fn reset(&mut self, channel: &ChannelId) -> bool {
        self.channels.remove(channel).is_some()
    }

    pub fn len(&self, channel: &ChannelId) -> usize {
        self.channels.get(channel).map_or(0, VecDeque::len)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn total_turns(&self) -> usize {
        self.channels.values().map(VecDeque::len).sum()
    }

    /// Copy out every channel for serialization.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Turn>> {
        self.channels
            .iter()
            .map(|(channel, turns)| (channel.to_string(), turns.iter().cloned().collect()))
            .collect()
    }

    /// Replace all contents with a loaded snapshot, clamping every channel.
    pub fn replace_all(&mut self, channels: BTreeMap<String, Vec<Turn>>) {
        self.channels.clear();
        for (channel, turns) in channels {
            let channel = ChannelId::from(channel);
            self.channels.insert(channel.clone(), VecDeque::from(turns));
            self.trim(&channel);
        }
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

fn evict_front(turns: &mut VecDeque<Turn>, max: usize) {
    while turns.len() > max {
        turns.pop_front();
    }
}
