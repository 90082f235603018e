//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Scope trace correlation identifiers to a request's log lines
//! - Configure log level at runtime
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment
//! - Correlation ids live on a `tracing` span entered for the request
//!   future, so they disappear from log context when the future completes

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::tracing::TraceContext;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

/// Log span carrying the correlation identifiers of `trace`.
///
/// Every event emitted while the span is entered includes `trace_id` and
/// `span_id`, the equivalent of a per-request correlation map.
pub fn correlation_span(trace: &TraceContext, method: &str, route: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        trace_id = %trace.trace_id(),
        span_id = %trace.span_id(),
        method = %method,
        route = %route,
    )
}
