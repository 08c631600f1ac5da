//! Tracing setup shared by demos and long-running hosts.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to warnings
/// plus this crate's info-level spans.
///
/// Call once at process start; a second call returns an error from the
/// global-default registration and is ignored here so tests can share a
/// process.
pub fn init() {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_line_number(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,rebook=info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
