//! Tracing subscriber setup

use crate::StockroomError;
use crate::config::{AppConfig, LogFormat, LoggingConfig};
use tracing::Span;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

/// Install the global subscriber. `RUST_LOG` takes precedence over `config.level`.
pub fn init(config: &LoggingConfig) -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| StockroomError::Config(format!("invalid log level {:?}: {e}", config.level)))?;

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Console => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| StockroomError::Config(format!("failed to install tracing subscriber: {e}")))
}

/// Process-wide span stamping service identity on records logged outside a request
pub fn service_span(app: &AppConfig) -> Span {
    tracing::info_span!(
        "service",
        service = %app.name,
        environment = app.environment.as_str(),
    )
}
