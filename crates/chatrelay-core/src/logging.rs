//! Runtime log-level control port.
//!
//! The `loglevel` chat command adjusts verbosity through this trait; the
//! tracing-subscriber implementation lives in chatrelay-observe.

/// Adjusts the active log filter at runtime.
pub trait LogControl: Send + Sync {
    /// Replace the active filter directive (e.g. "debug", "chatrelay_core=trace").
    fn set_level(&self, directive: &str) -> Result<(), String>;

    /// The directive currently in effect.
    fn current_level(&self) -> String;
}
