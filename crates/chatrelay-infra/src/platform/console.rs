//! Local chat over stdin/stdout.
//!
//! Each input line is one message from the local user. A leading
//! `#name ` selects the channel; lines without one are direct messages.
//! `@bot` anywhere in a channel line addresses the bot. Direct messages
//! always address it.

use std::io::BufRead;

use chatrelay_core::platform::ChatPlatform;
use chatrelay_types::chat::ChannelId;
use chatrelay_types::error::PlatformError;
use chatrelay_types::event::InboundMessage;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};

/// Mention token that addresses the bot.
pub const MENTION: &str = "@bot";

/// Console limit matches the usual chat platform cap.
const CONSOLE_MAX_LEN: usize = 2000;

/// stdin/stdout chat platform for local runs.
pub struct ConsolePlatform {
    author_id: String,
    author_name: String,
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsolePlatform {
    pub fn new(author_name: impl Into<String>) -> Self {
        Self {
            author_id: "console".to_string(),
            author_name: author_name.into(),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }

    /// Turn one input line into a message. Blank lines yield nothing.
    pub fn parse_line(&self, line: &str) -> Option<InboundMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (channel_id, rest) = match line.strip_prefix('#') {
            Some(tagged) => match tagged.split_once(char::is_whitespace) {
                Some((name, rest)) if !name.is_empty() => (Some(name.to_string()), rest.trim()),
                _ => return None,
            },
            None => (None, line),
        };

        let mentioned = rest.contains(MENTION);
        let content = rest
            .replace(MENTION, "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if content.is_empty() {
            return None;
        }

        Some(InboundMessage {
            mentions_bot: mentioned || channel_id.is_none(),
            channel_id,
            author_id: self.author_id.clone(),
            author_name: self.author_name.clone(),
            content,
            timestamp: Utc::now(),
            is_from_self: false,
        })
    }
}

impl ChatPlatform for ConsolePlatform {
    fn name(&self) -> &str {
        "console"
    }

    fn max_message_len(&self) -> usize {
        CONSOLE_MAX_LEN
    }

    async fn listen(&self, tx: mpsc::Sender<InboundMessage>) -> Result<(), PlatformError> {
        // A detached thread, so a read pending at shutdown never holds up
        // runtime teardown.
        let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
        std::thread::Builder::new()
            .name("console-stdin".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if line_tx.blocking_send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "console read failed");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| {
                tracing::error!(error = %e, "failed to start console reader");
                PlatformError::Closed
            })?;

        while let Some(line) = line_rx.recv().await {
            let Some(message) = self.parse_line(&line) else {
                continue;
            };
            if tx.send(message).await.is_err() {
                // Event loop is gone; stop reading.
                return Ok(());
            }
        }
        tracing::info!("console input closed");
        Ok(())
    }

    async fn send(&self, channel: &ChannelId, text: &str) -> Result<(), PlatformError> {
        let rendered = format!("[#{channel}] bot: {text}\n");
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(rendered.as_bytes())
            .await
            .map_err(|e| PlatformError::Send {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;
        stdout.flush().await.map_err(|e| PlatformError::Send {
            channel: channel.to_string(),
            reason: e.to_string(),
        })
    }
}
