//! In-memory test doubles for the core ports.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatrelay_types::chat::ChannelId;
use chatrelay_types::error::{PersistError, PlatformError};
use chatrelay_types::event::InboundMessage;
use chatrelay_types::llm::AiError;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::llm::AiBackend;
use crate::logging::LogControl;
use crate::persist::SnapshotStore;
use crate::platform::ChatPlatform;
use crate::session::{AiSession, CloseSession};

// ---------------------------------------------------------------------------
// Snapshot store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    contents: Mutex<Option<Vec<u8>>>,
    writes: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Duration,
}

/// Snapshot store backed by a byte buffer. Clones share the buffer.
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<MemoryInner>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(bytes: Vec<u8>) -> Self {
        let store = Self::new();
        *store.inner.contents.lock().unwrap() = Some(bytes);
        store
    }

    /// Each write takes `delay` before it lands.
    pub fn slow(delay: Duration) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                write_delay: delay,
                ..MemoryInner::default()
            }),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_writes(&self) -> usize {
        self.inner.max_active.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.inner.contents.lock().unwrap().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn read(&self) -> Result<Option<Vec<u8>>, PersistError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(PersistError::Io(std::io::Error::other("read refused")));
        }
        Ok(self.contents())
    }

    async fn write(&self, bytes: Vec<u8>) -> Result<(), PersistError> {
        let now = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.inner.write_delay.is_zero() {
            tokio::time::sleep(self.inner.write_delay).await;
        }
        self.inner.active.fetch_sub(1, Ordering::SeqCst);

        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistError::Io(std::io::Error::other("disk full")));
        }
        *self.inner.contents.lock().unwrap() = Some(bytes);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AI backend
// ---------------------------------------------------------------------------

/// Session double. Optionally exposes a teardown capability.
pub struct FakeSession {
    pub system_instruction: String,
    closed: Option<Arc<AtomicBool>>,
    fail_close: bool,
}

impl FakeSession {
    pub fn new(system_instruction: &str) -> Self {
        Self {
            system_instruction: system_instruction.to_string(),
            closed: None,
            fail_close: false,
        }
    }

    pub fn closeable(system_instruction: &str) -> Self {
        Self {
            closed: Some(Arc::new(AtomicBool::new(false))),
            ..Self::new(system_instruction)
        }
    }

    pub fn failing_close(system_instruction: &str) -> Self {
        Self {
            fail_close: true,
            ..Self::closeable(system_instruction)
        }
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed
            .clone()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)))
    }
}

impl AiSession for FakeSession {
    fn closer(&self) -> Option<&dyn CloseSession> {
        self.closed.as_ref().map(|_| self as &dyn CloseSession)
    }
}

impl CloseSession for FakeSession {
    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), AiError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_close {
                return Err(AiError::Provider {
                    message: "teardown refused".to_string(),
                });
            }
            if let Some(flag) = &self.closed {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(())
        })
    }
}

/// Backend double. Replies with `reply: <text>` unless scripted otherwise.
#[derive(Default)]
pub struct FakeBackend {
    scripted: Mutex<VecDeque<Result<String, AiError>>>,
    fail_create: AtomicBool,
    delay: Duration,
    created: AtomicUsize,
    sent: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each reply takes `delay` to arrive.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Queue a result for the next `send_message` call.
    pub fn script(&self, result: Result<String, AiError>) {
        self.scripted.lock().unwrap().push_back(result);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl AiBackend for FakeBackend {
    type Session = FakeSession;

    fn name(&self) -> &str {
        "fake"
    }

    async fn create_session(&self, system_instruction: &str) -> Result<FakeSession, AiError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AiError::AuthenticationFailed);
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession::new(system_instruction))
    }

    async fn send_message(&self, _session: &FakeSession, text: &str) -> Result<String, AiError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.sent.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.scripted.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("reply: {text}")))
    }
}

// ---------------------------------------------------------------------------
// Chat platform
// ---------------------------------------------------------------------------

/// One message accepted by [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: ChannelId,
    pub text: String,
}

/// Platform double that records every outbound message.
pub struct RecordingPlatform {
    max_len: usize,
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
}

impl RecordingPlatform {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.text).collect()
    }
}

impl ChatPlatform for RecordingPlatform {
    fn name(&self) -> &str {
        "recording"
    }

    fn max_message_len(&self) -> usize {
        self.max_len
    }

    async fn listen(&self, _tx: mpsc::Sender<InboundMessage>) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn send(&self, channel: &ChannelId, text: &str) -> Result<(), PlatformError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::Send {
                channel: channel.to_string(),
                reason: "missing permissions".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentMessage {
            channel: channel.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Log control and messages
// ---------------------------------------------------------------------------

/// Log control double that remembers the last directive.
pub struct FakeLogControl {
    level: Mutex<String>,
}

impl FakeLogControl {
    pub fn new(level: &str) -> Self {
        Self {
            level: Mutex::new(level.to_string()),
        }
    }
}

impl LogControl for FakeLogControl {
    fn set_level(&self, directive: &str) -> Result<(), String> {
        if directive.contains(' ') {
            return Err(format!("invalid directive '{directive}'"));
        }
        *self.level.lock().unwrap() = directive.to_string();
        Ok(())
    }

    fn current_level(&self) -> String {
        self.level.lock().unwrap().clone()
    }
}

/// An inbound message from user `7` ("ada").
pub fn inbound(channel: Option<&str>, content: &str, mentions_bot: bool) -> InboundMessage {
    InboundMessage {
        channel_id: channel.map(str::to_string),
        author_id: "7".to_string(),
        author_name: "ada".to_string(),
        content: content.to_string(),
        timestamp: Utc::now(),
        is_from_self: false,
        mentions_bot,
    }
}
