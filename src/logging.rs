//! Structured logging setup (spec 4.9), grounded in the same
//! `tracing-subscriber` `EnvFilter` pattern used across the rest of this
//! codebase's ambient stack.

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`,
/// defaulting to `info` when unset.
///
/// Safe to call more than once per process; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
