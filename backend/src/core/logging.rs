//! Logging setup
//!
//! The library only emits `tracing` events. Embedders that have no subscriber
//! of their own can call [`init_logging`] once at startup.

use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global compact subscriber filtered by `directives`
/// (e.g. `"info"` or `"info,liquidity_settlement_core=debug"`).
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(directives: &str) -> bool {
    let filter = EnvFilter::from_str(directives.trim()).unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).compact())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(directives, "Logging initialized");
    }
    installed
}

/// Test-friendly subscriber writing through the libtest capture.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}
