//! Tracing subscriber initialization with structured logging, a reloadable
//! level filter, and optional OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use chatrelay_observe::tracing_setup::{init_tracing, TracingOptions};
//!
//! let handle = init_tracing(&TracingOptions::default()).unwrap();
//! // Later, e.g. from the `!loglevel` chat command:
//! # use chatrelay_core::logging::LogControl;
//! handle.set_level("chatrelay_core=debug").unwrap();
//! ```

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use chatrelay_core::logging::LogControl;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// How the global subscriber is set up.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Bridge spans to OpenTelemetry with a stdout exporter.
    pub enable_otel: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            json: false,
            enable_otel: false,
        }
    }
}

/// Runtime handle on the active level filter.
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    current: Arc<Mutex<String>>,
}

impl LogLevelHandle {
    fn new(handle: reload::Handle<EnvFilter, Registry>, directive: &str) -> Self {
        Self {
            handle,
            current: Arc::new(Mutex::new(directive.to_string())),
        }
    }
}

impl LogControl for LogLevelHandle {
    fn set_level(&self, directive: &str) -> Result<(), String> {
        let filter = EnvFilter::try_new(directive)
            .map_err(|e| format!("invalid filter directive '{directive}': {e}"))?;
        self.handle
            .reload(filter)
            .map_err(|e| format!("failed to apply filter: {e}"))?;
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = directive.to_string();
        Ok(())
    }

    fn current_level(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Initialize the global tracing subscriber.
///
/// - Installs a `fmt` layer (plain or JSON, on stderr) behind a reloadable
///   `EnvFilter`.
///   `RUST_LOG` wins over `options.default_level`.
/// - When `enable_otel` is true, additionally bridges tracing spans to
///   OpenTelemetry using a stdout exporter.
///
/// # Errors
///
/// Returns an error if the default level is not a valid filter or the global
/// subscriber has already been set.
pub fn init_tracing(
    options: &TracingOptions,
) -> Result<LogLevelHandle, Box<dyn std::error::Error + Send + Sync>> {
    let (directive, env_filter) = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(from_env) if !from_env.trim().is_empty() => {
            let filter = EnvFilter::try_new(&from_env)?;
            (from_env, filter)
        }
        _ => (
            options.default_level.clone(),
            EnvFilter::try_new(&options.default_level)?,
        ),
    };
    let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

    // stderr keeps stdout free for chat output and command results.
    let fmt_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let otel_layer = if options.enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("chatrelay");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(LogLevelHandle::new(reload_handle, &directive))
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
