//! Diagnostic tracing for the gate.
//!
//! Everything goes to stderr. Stdout carries exactly one decision line, so
//! nothing here may write there.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Gate-specific filter variable, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "RALPH_GATE_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Install a compact stderr subscriber.
///
/// ```bash
/// RALPH_GATE_LOG=ralph_gate=debug ralph-gate stop < hook.json
/// ```
///
/// A second call is a no-op.
pub fn init() {
    let filter = resolve_filter(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
    );

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

/// First directive that parses wins; otherwise `warn`.
fn resolve_filter(gate: Option<&str>, rust_log: Option<&str>) -> EnvFilter {
    [gate, rust_log]
        .into_iter()
        .flatten()
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
