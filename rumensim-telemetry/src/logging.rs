//! Structured logging bootstrap.
//!
//! Every dropped command, rejected configuration, publish failure, and tick
//! fault in the engine flows through `tracing` so no failure is ever silent.
//! The filter comes from `RUST_LOG`, defaulting to `info`.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Install the global subscriber. Call once from the binary entry point.
    pub fn init() {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .init()
    }

    /// Same as `init`, but non-panicking when a subscriber is already set.
    /// Used by tests that share a process.
    pub fn try_init() {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .try_init();
    }
}
