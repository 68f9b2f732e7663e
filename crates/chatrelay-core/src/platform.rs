//! ChatPlatform trait definition and outbound text shaping.
//!
//! The platform collaborator delivers inbound messages to the relay's event
//! loop and sends replies back to a channel. Wire protocols stay in
//! chatrelay-infra adapters.

use std::borrow::Cow;

use chatrelay_types::chat::ChannelId;
use chatrelay_types::error::PlatformError;
use chatrelay_types::event::InboundMessage;
use tokio::sync::mpsc;

/// Marker appended to text cut at the platform limit.
pub const ELLIPSIS: char = '…';

/// Trait for chat platform adapters.
pub trait ChatPlatform: Send + Sync + 'static {
    /// Human-readable platform name (e.g., "console").
    fn name(&self) -> &str;

    /// Maximum characters accepted in one outbound message.
    fn max_message_len(&self) -> usize;

    /// Deliver inbound messages to `tx` until the platform disconnects.
    ///
    /// Returns `Ok(())` on a clean end of stream.
    fn listen(
        &self,
        tx: mpsc::Sender<InboundMessage>,
    ) -> impl std::future::Future<Output = Result<(), PlatformError>> + Send;

    /// Send `text` to `channel`. Callers keep `text` within
    /// [`ChatPlatform::max_message_len`].
    fn send(
        &self,
        channel: &ChannelId,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), PlatformError>> + Send;
}

/// Cut `text` to at most `max_chars` characters, ending with [`ELLIPSIS`]
/// when anything was removed. Counts chars, never splits a code point.
pub fn truncate_for_platform(text: &str, max_chars: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_chars {
        return Cow::Borrowed(text);
    }
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    let keep = max_chars - 1;
    let cut = text
        .char_indices()
        .nth(keep)
        .map_or(text.len(), |(idx, _)| idx);
    let mut out = String::with_capacity(cut + ELLIPSIS.len_utf8());
    out.push_str(&text[..cut]);
    out.push(ELLIPSIS);
    Cow::Owned(out)
}
