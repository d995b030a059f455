//! Telemetry logic.
//! Support logging and metrics exposition.
use prometheus::{Encoder, Registry, TextEncoder};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global `tracing` subscriber.
///
/// Verbosity comes from `RUST_LOG`, `info` by default.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("tracing subscriber already installed: {err}");
    }
}

/// Render every family of `registry` in Prometheus text format.
pub fn encode_text(registry: &Registry) -> String {
    let encoder = TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %err, "could not encode metrics");
    }

    match String::from_utf8(buffer) {
        Ok(text) => text,
        Err(err) => {
            tracing::error!(error = %err, "metrics are not valid utf8");
            String::default()
        },
    }
}

/// Content type of [`encode_text`] output.
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_owned()
}
