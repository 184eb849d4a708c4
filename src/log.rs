//! Thin wrapper over `tracing` matching the five-level vocabulary Redis
//! internals use, so call sites read `log::notice!(...)` instead of bare
//! `tracing::info!(...)`.

/// Install the global subscriber. Call once, before the accept loop starts.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub use tracing::debug as verbose;
pub use tracing::error;
pub use tracing::info as notice;
pub use tracing::trace as debug;
pub use tracing::warn as warning;
