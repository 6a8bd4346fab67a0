// Tracing setup
//
// Console logging via tracing-subscriber with an EnvFilter. JSON output is
// available for runs whose logs are collected by another process.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter when neither `RUST_LOG` nor `LOG_LEVEL` is set
pub const DEFAULT_LOG_FILTER: &str = "scrivener=info,scrivener_core=info,scrivener_durable=info";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for tracing
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Log filter (e.g., "info", "debug", "scrivener_core=debug")
    pub log_filter: Option<String>,
    pub format: LogFormat,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `SCRIVENER_LOG_FORMAT`: "json" for structured output
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            format: match std::env::var("SCRIVENER_LOG_FORMAT") {
                Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            with_target: true,
        }
    }

    /// Override the log filter (e.g. from `-v` flags)
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// Install the global tracing subscriber
///
/// Safe to call more than once; later calls are ignored.
///
/// # Example
///
/// ```ignore
/// use scrivener_core::telemetry::{init_tracing, TelemetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     init_tracing(TelemetryConfig::from_env());
///     // ... your application code
/// }
/// ```
pub fn init_tracing(config: TelemetryConfig) {
    let filter = config
        .log_filter
        .as_ref()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    let layer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(config.with_target)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(config.with_target)
            .with_filter(filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
