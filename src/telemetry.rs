//! Logging initialization for binaries and tests embedding the ledger.
//!
//! The library only emits `tracing` events; nothing is printed until a host
//! installs a subscriber, either its own or the one set up here.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default("info");
}

/// Same as [`init`] with a caller-chosen fallback directive (e.g. `"ledger_core=debug"`).
pub fn init_with_default(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
