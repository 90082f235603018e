//! Error response construction.
//!
//! # Responsibilities
//! - Define the error body every failure path returns
//! - Mirror a mapped error onto the request's root span, the error counter,
//!   the error ledger and one log line
//!
//! # Design Decisions
//! - `map_error` is the only place an `AppError` becomes a client response
//! - Mapped responses carry a `MappedError` marker so the trace isolation
//!   post-phase keeps the specific span status instead of `HTTP <code>`

use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use opentelemetry::trace::Status;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldErrors};
use crate::http::request::RequestContext;
use crate::observability::{metrics, ErrorLedger};

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<FieldErrors>,
    pub trace_id: String,
    pub span_id: String,
}

/// Marks a response whose error has already been recorded on the root span.
#[derive(Debug, Clone, Copy)]
pub struct MappedError;

/// Classify `err`, record it on every signal and build the client response.
pub fn map_error(err: &AppError, rc: &RequestContext, ledger: &ErrorLedger) -> Response {
    let class = err.classification();
    let message = err.to_string();

    let body = ErrorResponse {
        timestamp: Utc::now(),
        status: class.status.as_u16(),
        error: class.code.to_string(),
        message: message.clone(),
        path: rc.path_description(),
        validation_errors: err.field_errors().cloned(),
        trace_id: rc.trace.trace_id(),
        span_id: rc.trace.span_id(),
    };

    rc.trace.record_error(err);
    rc.trace.set_status(Status::error(message.clone()));
    rc.trace.set_attributes([
        KeyValue::new("error.type", class.code),
        KeyValue::new("error.message", message.clone()),
        KeyValue::new("component", class.component),
        KeyValue::new("exception.type", class.exception_type),
    ]);

    metrics::record_error(class.code, class.component, class.exception_type, &rc.route);
    ledger.record(class);

    if class.status.is_server_error() {
        tracing::error!(
            error.code = class.code,
            error.component = class.component,
            exception.type = class.exception_type,
            path = %body.path,
            trace_id = %body.trace_id,
            span_id = %body.span_id,
            error = %message,
            "Request failed"
        );
    } else {
        tracing::warn!(
            error.code = class.code,
            error.component = class.component,
            exception.type = class.exception_type,
            path = %body.path,
            trace_id = %body.trace_id,
            span_id = %body.span_id,
            error = %message,
            "Request rejected"
        );
    }

    let mut response = (class.status, Json(body)).into_response();
    response.extensions_mut().insert(MappedError);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Telemetry;
    use axum::http::{Method, StatusCode};
    use opentelemetry::trace::SpanKind;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

    #[tokio::test]
    async fn test_body_carries_root_span_ids() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let telemetry = Telemetry::from_provider(provider);
        let root = telemetry.start_root("GET /api/orders/{id}", SpanKind::Server, vec![]);
        let rc = RequestContext {
            trace: root.context().clone(),
            method: Method::GET,
            path: "/api/orders/997".into(),
            route: "/api/orders/{id}".into(),
            request_id: "req-1".into(),
        };
        let ledger = ErrorLedger::new();

        let err = AppError::RateLimit("Too many requests. Please try again later.".into());
        let response = map_error(&err, &rc, &ledger);
        root.end();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.extensions().get::<MappedError>().is_some());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "RATE_LIMIT_EXCEEDED");
        assert_eq!(body.path, "uri=/api/orders/997");
        assert_eq!(body.validation_errors, None);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(body.trace_id, spans[0].span_context.trace_id().to_string());
        assert_eq!(body.span_id, spans[0].span_context.span_id().to_string());
        assert_eq!(spans[0].status, Status::error("Too many requests. Please try again later."));
        assert_eq!(ledger.summary().errors_by_code.get("RATE_LIMIT_EXCEEDED"), Some(&1));
    }
}
