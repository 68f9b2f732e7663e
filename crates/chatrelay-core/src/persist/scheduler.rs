//! Debounced save scheduling.
//!
//! Bursts of save requests collapse into a single write that happens once
//! the requests have been quiet for the configured interval. At most one
//! pending task exists at a time, and a write is never interrupted: a
//! request that arrives while a write is running schedules a follow-up
//! write instead.
//!
//! [`SaveScheduler::request_now`] skips the quiet period but still goes
//! through the same task, so immediate and debounced writes never overlap.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Something the scheduler can write out.
pub trait Persist: Send + Sync + 'static {
    /// Write the current state. Failures are the implementor's to report.
    fn persist(&self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug)]
struct State {
    generation: u64,
    last_request: Instant,
    handle: Option<JoinHandle<()>>,
    saving: bool,
    urgent: bool,
    closed: bool,
}

/// Single-slot debounce timer for snapshot writes.
#[derive(Debug)]
pub struct SaveScheduler {
    interval: Duration,
    state: Arc<Mutex<State>>,
    wake: Arc<Notify>,
}

impl SaveScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(State {
                generation: 0,
                last_request: Instant::now(),
                handle: None,
                saving: false,
                urgent: false,
                closed: false,
            })),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Ask for `target` to be persisted once requests go quiet.
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    pub fn request<P: Persist>(&self, target: Arc<P>) {
        self.schedule(target, false);
    }

    /// Ask for `target` to be persisted without waiting out the interval.
    ///
    /// Returns immediately. A write already running finishes first and is
    /// followed by another one.
    pub fn request_now<P: Persist>(&self, target: Arc<P>) {
        self.schedule(target, true);
    }

    fn schedule<P: Persist>(&self, target: Arc<P>, urgent: bool) {
        let mut state = lock(&self.state);
        if state.closed {
            tracing::debug!("save requested after scheduler closed, ignoring");
            return;
        }

        state.generation = state.generation.wrapping_add(1);
        state.last_request = Instant::now();
        state.urgent |= urgent;

        // The running task picks up the new generation on its next wake.
        if state.handle.is_some() {
            drop(state);
            if urgent {
                self.wake.notify_one();
            }
            return;
        }

        let task_state = Arc::clone(&self.state);
        let wake = Arc::clone(&self.wake);
        let interval = self.interval;
        state.handle = Some(tokio::spawn(run_pending(task_state, wake, interval, target)));
    }

    /// Whether a save is scheduled or running.
    pub fn is_pending(&self) -> bool {
        lock(&self.state).handle.is_some()
    }

    /// Stop accepting requests and settle the pending task.
    ///
    /// A task still waiting out the interval is cancelled. A write already
    /// in progress is allowed to finish.
    pub async fn close(&self) {
        let (handle, saving) = {
            let mut state = lock(&self.state);
            state.closed = true;
            (state.handle.take(), state.saving)
        };

        let Some(handle) = handle else {
            return;
        };
        if saving {
            tracing::debug!("waiting for in-flight save before shutdown");
        } else {
            handle.abort();
        }
        // A cancelled task reports a JoinError; nothing to do with it.
        let _ = handle.await;
    }
}

async fn run_pending<P: Persist>(
    shared: Arc<Mutex<State>>,
    wake: Arc<Notify>,
    interval: Duration,
    target: Arc<P>,
) {
    loop {
        let (deadline, urgent) = {
            let state = lock(&shared);
            (state.last_request + interval, state.urgent)
        };
        if !urgent {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = wake.notified() => {}
            }
        }

        let generation = {
            let mut state = lock(&shared);
            if state.closed {
                return;
            }
            // A later request moved the deadline.
            if !state.urgent && Instant::now() < state.last_request + interval {
                continue;
            }
            state.urgent = false;
            state.saving = true;
            state.generation
        };

        target.persist().await;

        let mut state = lock(&shared);
        state.saving = false;
        if state.closed || state.generation == generation {
            state.handle = None;
            return;
        }
        // Requested again mid-write; wait out the interval from that request.
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
