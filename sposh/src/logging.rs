//! Diagnostic tracing for the engine and its host.
//!
//! Build events are logged at `debug`, per-node firing at `trace`, lex
//! diagnostics and legacy drive collection tags at `warn`, and host loop
//! milestones at `info`. Step reports printed by `sposh run` are regular
//! stdout output and do not depend on `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`.
///
/// # Example
/// ```bash
/// RUST_LOG=sposh=trace sposh run plans/forage.lap --behaviours plans/forage.toml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second call (tests, embedding hosts) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
