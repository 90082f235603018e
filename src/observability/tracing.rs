//! Span creation and explicit trace context passing.
//!
//! # Responsibilities
//! - Build the OpenTelemetry tracer provider (OTLP batch export or local only)
//! - Start request root spans detached from any ambient context
//! - Carry the active span through call chains as a `TraceContext` value
//! - End every span exactly once through `SpanGuard`
//!
//! # Design Decisions
//! - No thread-local "current span": callers pass `&TraceContext` down and
//!   hand a clone to background tasks at submission time
//! - `SpanGuard::end` consumes the guard, so a span cannot be ended twice;
//!   dropping an unended guard (early return, panic, cancelled future) ends it
//! - Spans are created even with export disabled so trace ids still exist
//!   for error correlation

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use opentelemetry::trace::{
    Span as _, SpanKind, Status, TraceContextExt, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use thiserror::Error;

use crate::config::TelemetryConfig;

/// Instrumentation scope name for every span this service creates.
pub const TRACER_NAME: &str = "serversage";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build OTLP span exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
}

/// Owner of the tracer provider.
#[derive(Clone)]
pub struct Telemetry {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
}

impl Telemetry {
    /// Build the provider from configuration.
    pub fn init(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let resource = Resource::builder()
            .with_service_name(config.service_name.clone())
            .with_attribute(KeyValue::new("service.version", config.service_version.clone()))
            .with_attribute(KeyValue::new("deployment.environment", config.environment.clone()))
            .build();

        let mut builder = SdkTracerProvider::builder().with_resource(resource);

        if config.enabled {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(config.otlp_endpoint.clone())
                .build()?;

            let batch = BatchConfigBuilder::default()
                .with_max_export_batch_size(config.max_export_batch_size)
                .with_max_queue_size(config.max_queue_size)
                .with_scheduled_delay(Duration::from_millis(config.scheduled_delay_ms))
                .build();

            builder = builder.with_span_processor(
                BatchSpanProcessor::builder(exporter)
                    .with_batch_config(batch)
                    .build(),
            );

            tracing::info!(
                endpoint = %config.otlp_endpoint,
                batch_size = config.max_export_batch_size,
                scheduled_delay_ms = config.scheduled_delay_ms,
                "OTLP span export enabled"
            );
        } else {
            tracing::info!("OTLP span export disabled");
        }

        Ok(Self::from_provider(builder.build()))
    }

    /// Wrap an already built provider.
    pub fn from_provider(provider: SdkTracerProvider) -> Self {
        let tracer = provider.tracer(TRACER_NAME);
        Self { provider, tracer }
    }

    /// Start a new root span. The parent is always an empty context, never
    /// whatever happens to be ambient.
    pub fn start_root(
        &self,
        name: impl Into<Cow<'static, str>>,
        kind: SpanKind,
        attributes: Vec<KeyValue>,
    ) -> SpanGuard {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(kind)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &Context::new());

        SpanGuard::new(TraceContext {
            cx: Context::new().with_span(span),
            tracer: self.tracer.clone(),
        })
    }

    /// Flush pending spans and stop the exporter.
    pub fn shutdown(&self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
}

/// The active span of one logical operation plus the tracer used for children.
#[derive(Clone)]
pub struct TraceContext {
    cx: Context,
    tracer: SdkTracer,
}

impl TraceContext {
    /// Hex trace id of the active span.
    pub fn trace_id(&self) -> String {
        self.cx.span().span_context().trace_id().to_string()
    }

    /// Hex span id of the active span.
    pub fn span_id(&self) -> String {
        self.cx.span().span_context().span_id().to_string()
    }

    /// Start a child of the active span.
    pub fn start_child(
        &self,
        name: impl Into<Cow<'static, str>>,
        kind: SpanKind,
        attributes: Vec<KeyValue>,
    ) -> SpanGuard {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(kind)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &self.cx);

        SpanGuard::new(TraceContext {
            cx: self.cx.with_span(span),
            tracer: self.tracer.clone(),
        })
    }

    pub fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    pub fn set_attributes(&self, attributes: impl IntoIterator<Item = KeyValue>) {
        self.cx.span().set_attributes(attributes);
    }

    pub fn set_status(&self, status: Status) {
        self.cx.span().set_status(status);
    }

    /// Record an error as an `exception` event on the active span.
    pub fn record_error(&self, err: &dyn std::error::Error) {
        self.cx.span().record_error(err);
    }

    pub fn add_event(&self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        self.cx.span().add_event(name, attributes);
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("trace_id", &self.trace_id())
            .field("span_id", &self.span_id())
            .finish()
    }
}

/// Ownership of a started span. The span ends exactly once: explicitly via
/// `end`, or on drop if the owner never got that far.
pub struct SpanGuard {
    cx: TraceContext,
    ended: bool,
}

impl SpanGuard {
    fn new(cx: TraceContext) -> Self {
        Self { cx, ended: false }
    }

    /// Context whose active span is the guarded span.
    pub fn context(&self) -> &TraceContext {
        &self.cx
    }

    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.ended {
            self.ended = true;
            self.cx.cx.span().end();
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if !self.ended {
            tracing::debug!(span_id = %self.cx.span_id(), "Span guard dropped before end");
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_sdk::trace::InMemorySpanExporter;

    fn telemetry() -> (Telemetry, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (Telemetry::from_provider(provider), exporter)
    }

    #[test]
    fn test_root_spans_never_share_a_trace() {
        let (telemetry, _exporter) = telemetry();
        let a = telemetry.start_root("GET /a", SpanKind::Server, vec![]);
        let b = telemetry.start_root("GET /b", SpanKind::Server, vec![]);

        assert_ne!(a.context().trace_id(), b.context().trace_id());
        assert_eq!(a.context().trace_id().len(), 32);
        assert_eq!(a.context().span_id().len(), 16);
    }

    #[test]
    fn test_child_inherits_trace_and_links_parent() {
        let (telemetry, exporter) = telemetry();
        let root = telemetry.start_root("root", SpanKind::Server, vec![]);
        let child = root.context().start_child("child", SpanKind::Internal, vec![]);

        assert_eq!(root.context().trace_id(), child.context().trace_id());
        assert_ne!(root.context().span_id(), child.context().span_id());

        let root_span_id = root.context().span_id();
        child.end();
        root.end();

        let spans = exporter.get_finished_spans().unwrap();
        let child = spans.iter().find(|s| s.name == "child").unwrap();
        assert_eq!(child.parent_span_id.to_string(), root_span_id);
    }

    #[test]
    fn test_guard_ends_span_once_on_drop() {
        let (telemetry, exporter) = telemetry();
        {
            let _guard = telemetry.start_root("dropped", SpanKind::Server, vec![]);
        }
        let guard = telemetry.start_root("explicit", SpanKind::Server, vec![]);
        guard.end();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.iter().filter(|s| s.name == "dropped").count(), 1);
        assert_eq!(spans.iter().filter(|s| s.name == "explicit").count(), 1);
    }
}
