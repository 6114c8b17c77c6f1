//! Log output setup.
//!
//! `RUST_LOG` overrides the default filter. `LOG_FORMAT=json` switches to one
//! JSON object per event for log shippers.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,api_server=debug,quill_infra=debug,quill_core=debug";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub json_logs: bool,
    /// Recorded once at startup so aggregated logs can be told apart.
    pub service_name: String,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            json_logs: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
            service_name: std::env::var("SERVICE_NAME").unwrap_or_else(|_| "quill-api".into()),
        }
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_telemetry(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Exactly one of the two format layers is present.
    tracing_subscriber::registry()
        .with(filter)
        .with(config.json_logs.then(|| fmt::layer().json().flatten_event(true)))
        .with((!config.json_logs).then(|| fmt::layer().pretty()))
        .init();

    tracing::info!(
        service = %config.service_name,
        format = if config.json_logs { "json" } else { "pretty" },
        "Logging initialized"
    );
}
