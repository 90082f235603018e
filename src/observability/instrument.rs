//! Method-level instrumentation for controllers, services and repositories.
//!
//! # Responsibilities
//! - Wrap a call in an INTERNAL span named `<Type>.<method>`
//! - Record call duration and, on failure, the error on span and counter
//! - Return the call's result untouched
//!
//! # Design Decisions
//! - Each instrumented type declares a `const Component` and routes its
//!   public methods through `Component::call`; there is no runtime
//!   pattern matching on method names
//! - The wrapped closure receives the child context, so anything it calls
//!   nests under the method span

use std::future::Future;
use std::time::Instant;

use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::KeyValue;

use crate::error::AppError;
use crate::observability::metrics;
use crate::observability::tracing::TraceContext;

/// Architectural layer of an instrumented type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Controller,
    Service,
    Repository,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Controller => "controller",
            Layer::Service => "service",
            Layer::Repository => "repository",
        }
    }
}

/// An instrumented type: its layer and the name used in span names and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub layer: Layer,
    pub type_name: &'static str,
}

impl Component {
    pub const fn controller(type_name: &'static str) -> Self {
        Self { layer: Layer::Controller, type_name }
    }

    pub const fn service(type_name: &'static str) -> Self {
        Self { layer: Layer::Service, type_name }
    }

    pub const fn repository(type_name: &'static str) -> Self {
        Self { layer: Layer::Repository, type_name }
    }

    /// Run `f` inside a `<Type>.<method>` span.
    pub async fn call<T, F, Fut>(&self, parent: &TraceContext, method: &'static str, f: F) -> Result<T, AppError>
    where
        F: FnOnce(TraceContext) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let guard = parent.start_child(
            format!("{}.{}", self.type_name, method),
            SpanKind::Internal,
            vec![
                KeyValue::new("component", self.layer.as_str()),
                KeyValue::new("code.namespace", self.type_name),
                KeyValue::new("code.function", method),
                KeyValue::new("operation", method),
            ],
        );

        let started = Instant::now();
        let result = f(guard.context().clone()).await;
        let elapsed = started.elapsed();

        let span = guard.context();
        span.set_attribute(KeyValue::new("duration_ms", elapsed.as_secs_f64() * 1000.0));

        match &result {
            Ok(_) => {
                span.set_status(Status::Ok);
                metrics::record_method(self.layer.as_str(), self.type_name, method, "success", elapsed);
                tracing::debug!(
                    layer = self.layer.as_str(),
                    class = self.type_name,
                    method,
                    duration_ms = elapsed.as_millis() as u64,
                    "Method completed"
                );
            }
            Err(err) => {
                let classification = err.classification();
                span.record_error(err);
                span.set_status(Status::error(err.to_string()));
                span.set_attributes([
                    KeyValue::new("error", true),
                    KeyValue::new("error.type", classification.exception_type),
                    KeyValue::new("error.message", err.to_string()),
                ]);
                metrics::record_method(self.layer.as_str(), self.type_name, method, "error", elapsed);
                metrics::record_error(classification.code, self.type_name, classification.exception_type, method);
                tracing::warn!(
                    layer = self.layer.as_str(),
                    class = self.type_name,
                    method,
                    exception.type = classification.exception_type,
                    error = %err,
                    duration_ms = elapsed.as_millis() as u64,
                    "Method failed"
                );
            }
        }

        guard.end();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::tracing::Telemetry;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

    const SERVICE: Component = Component::service("WidgetService");

    fn telemetry() -> (Telemetry, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (Telemetry::from_provider(provider), exporter)
    }

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let (telemetry, exporter) = telemetry();
        let root = telemetry.start_root("root", SpanKind::Server, vec![]);

        let value = SERVICE
            .call(root.context(), "find", |_cx| async { Ok::<_, AppError>(42) })
            .await
            .unwrap();
        root.end();

        assert_eq!(value, 42);
        let spans = exporter.get_finished_spans().unwrap();
        let span = spans.iter().find(|s| s.name == "WidgetService.find").unwrap();
        assert_eq!(span.status, Status::Ok);
        assert_eq!(span.span_kind, SpanKind::Internal);
    }

    #[tokio::test]
    async fn test_error_is_recorded_and_returned_unchanged() {
        let (telemetry, exporter) = telemetry();
        let root = telemetry.start_root("root", SpanKind::Server, vec![]);

        let err = SERVICE
            .call(root.context(), "create", |_cx| async {
                Err::<(), _>(AppError::BusinessLogic("nope".into()))
            })
            .await
            .unwrap_err();
        root.end();

        assert!(matches!(err, AppError::BusinessLogic(ref m) if m == "nope"));
        let spans = exporter.get_finished_spans().unwrap();
        let span = spans.iter().find(|s| s.name == "WidgetService.create").unwrap();
        assert_eq!(span.status, Status::error("nope"));
        assert!(span.events.events.iter().any(|e| e.name == "exception"));
    }

    #[tokio::test]
    async fn test_nested_calls_form_a_tree() {
        let (telemetry, exporter) = telemetry();
        let root = telemetry.start_root("root", SpanKind::Server, vec![]);
        let repo = Component::repository("WidgetRepository");

        SERVICE
            .call(root.context(), "outer", |cx| async move {
                repo.call(&cx, "inner", |_cx| async { Ok(()) }).await
            })
            .await
            .unwrap();
        root.end();

        let spans = exporter.get_finished_spans().unwrap();
        let outer = spans.iter().find(|s| s.name == "WidgetService.outer").unwrap();
        let inner = spans.iter().find(|s| s.name == "WidgetRepository.inner").unwrap();
        assert_eq!(inner.parent_span_id, outer.span_context.span_id());
    }
}
