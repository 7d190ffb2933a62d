//! Tracing subscriber setup.

use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str = "mediaflow=debug,tower_http=debug";

/// Install the global subscriber: `EnvFilter` from `RUST_LOG` (falling back
/// to `mediaflow=debug,tower_http=debug`) and a compact or JSON fmt layer.
///
/// Calling it again once a subscriber is installed is a no-op.
pub fn init_telemetry(json: bool) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        let console_fmt = tracing_subscriber::fmt::layer()
            .event_format(Format::default().compact().with_target(false));
        tracing_subscriber::registry()
            .with(filter)
            .with(console_fmt)
            .try_init()
    };

    if let Err(e) = result {
        // A subscriber is already installed (tests, embedding).
        tracing::debug!(error = %e, "Tracing subscriber already initialized");
        return Ok(());
    }

    tracing::info!(json, "Tracing initialized");
    Ok(())
}
