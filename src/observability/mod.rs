//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP interceptor ──▶ tracing.rs   (root span, TraceContext)
//!        │                 │
//!        │                 ▼
//!        │           instrument.rs  (controller/service/repository spans)
//!        │                 │
//!        │                 ▼
//!        │           db::tracer     (db.* client spans)
//!        │
//!        ├──▶ metrics.rs  (counters, gauges, histograms → Prometheus)
//!        ├──▶ logging.rs  (structured log events with trace correlation)
//!        └──▶ ledger.rs   (error tally for the summary endpoint)
//!
//! Consumers:
//!     → OTLP collector (spans, batched)
//!     → Metrics endpoint (Prometheus scrape)
//!     → stdout (pretty or JSON logs)
//! ```
//!
//! # Design Decisions
//! - One emission API per signal: spans via `TraceContext`, metrics via
//!   `metrics.rs` functions, logs via `tracing` macros
//! - Trace context is passed explicitly, never looked up ambiently
//! - Metrics are cheap (atomic increments)

pub mod instrument;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use instrument::{Component, Layer};
pub use ledger::{ErrorLedger, ErrorSummary};
pub use self::tracing::{SpanGuard, Telemetry, TelemetryError, TraceContext};
