//! The relay event loop.
//!
//! One loop task owns intake: platform messages arrive over an mpsc channel
//! and are handled in order. AI replies run on tracked tasks so a slow
//! backend never stalls intake. On Ctrl+C, SIGTERM, or the end of the
//! platform stream the loop stops, in-flight replies get a bounded grace
//! period, and a final snapshot is written.

use std::sync::Arc;
use std::time::Duration;

use chatrelay_core::platform::ChatPlatform;
use chatrelay_core::relay::{RelayService, RelaySettings};
use chatrelay_core::state::LoadOutcome;
use chatrelay_infra::platform::ConsolePlatform;
use chatrelay_observe::LogLevelHandle;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::state::AppState;

/// Inbound messages buffered between the platform and the loop.
const INBOUND_BUFFER: usize = 256;

/// How long shutdown waits for replies already in flight.
const REPLY_GRACE: Duration = Duration::from_secs(10);

pub async fn run(app: AppState, user: String, log_control: LogLevelHandle) -> anyhow::Result<()> {
    let (system_instruction, backend) = app.ai_backend().await?;

    // History must be in place before the first event.
    match app.load_snapshot().await {
        LoadOutcome::Recovered { reason } => {
            tracing::warn!(%reason, "continuing with empty history");
        }
        LoadOutcome::Fresh | LoadOutcome::Loaded { .. } => {}
    }

    let platform = Arc::new(ConsolePlatform::new(user));
    let settings = RelaySettings {
        command_prefix: app.config.command_prefix.clone(),
        max_message_len: app.config.max_message_len,
        system_instruction,
    };
    let service = Arc::new(
        RelayService::new(
            Arc::clone(&app.state),
            Arc::new(backend),
            Arc::clone(&platform),
            settings,
        )
        .with_log_control(Arc::new(log_control)),
    );

    let (tx, mut rx) = mpsc::channel(INBOUND_BUFFER);
    let listener = {
        let platform = Arc::clone(&platform);
        tokio::spawn(async move { platform.listen(tx).await })
    };

    tracing::info!(
        platform = platform.name(),
        model = %app.config.model,
        snapshot = %app.config.snapshot_path_in(&app.data_dir).display(),
        "relay running"
    );

    let tracker = TaskTracker::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
            message = rx.recv() => match message {
                Some(message) => {
                    if let Some(reply) = service.handle(message).await {
                        tracker.spawn(reply.run());
                    }
                }
                None => {
                    tracing::info!("platform stream ended");
                    break;
                }
            },
        }
    }

    listener.abort();
    tracker.close();
    if tokio::time::timeout(REPLY_GRACE, tracker.wait()).await.is_err() {
        tracing::warn!(
            pending = tracker.len(),
            "replies still in flight at shutdown, abandoning them"
        );
    }

    // Final unconditional save; failure is logged by the state manager.
    if app.state.shutdown().await.is_ok() {
        tracing::info!("final snapshot written");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
