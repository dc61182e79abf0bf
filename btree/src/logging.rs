//! Diagnostics for the `btree` binary.
//!
//! The library only emits `tracing` events (node enter/exit at `trace`, guard
//! failures and state switches at `debug`). Nothing is printed unless a
//! subscriber is installed, which only the binary does.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber.
///
/// Filter comes from `RUST_LOG`, `warn` when unset.
///
/// # Example
/// ```bash
/// RUST_LOG=btree=trace btree run patrol --frames 5
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
