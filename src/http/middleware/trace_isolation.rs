//! Per-request root span and correlation scope.
//!
//! # Responsibilities
//! - Buffer the request body (bounded) for capture, then hand it on unchanged
//! - Start a fresh SERVER root span per request, detached from any ambient
//!   context, and publish it as `RequestContext`
//! - Run the handler inside the request's log correlation span, catching
//!   panics so the post-phase always runs
//! - Record status, sizes, bodies and duration, pick the final span status
//!   and end the root span once
//!
//! # Design Decisions
//! - The root guard is owned by this function; if the request future is
//!   dropped midway, the guard's `Drop` still ends the span
//! - A panic becomes an `InternalError` mapped like any other error

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;
use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::KeyValue;
use tower_http::request_id::RequestId;
use tracing::Instrument;

use crate::config::CaptureConfig;
use crate::error::AppError;
use crate::http::request::{client_ip, peer_addr, route_label, truncate_body, RequestContext, X_REQUEST_ID};
use crate::http::response::{map_error, MappedError};
use crate::http::server::AppState;
use crate::observability::logging::correlation_span;
use crate::observability::metrics;

/// Keeps the active-requests gauge balanced on every exit path.
struct ActiveRequest;

impl ActiveRequest {
    fn start() -> Self {
        metrics::record_request_started();
        ActiveRequest
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        metrics::record_request_finished();
    }
}

pub async fn isolate_trace(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let _active = ActiveRequest::start();

    let (mut parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    let route = route_label(&parts);
    let request_id = request_id(&parts);

    let root = state.telemetry.start_root(
        format!("{} {}", method, route),
        SpanKind::Server,
        request_attributes(&parts, &route, &request_id, &state.service_name),
    );
    let rc = RequestContext {
        trace: root.context().clone(),
        method: method.clone(),
        path,
        route: route.clone(),
        request_id,
    };
    let log_span = correlation_span(&rc.trace, method.as_str(), &route);

    let response = async {
        let capture = &state.capture;
        let response = match axum::body::to_bytes(body, capture.max_body_bytes).await {
            Ok(bytes) => {
                if captures_body(&method) && !bytes.is_empty() {
                    let text = String::from_utf8_lossy(&bytes);
                    rc.trace.set_attribute(KeyValue::new(
                        "http.request.body",
                        truncate_body(&text, capture.request_body_chars),
                    ));
                }

                parts.extensions.insert(rc.clone());
                let req = Request::from_parts(parts, Body::from(bytes));

                match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                    Ok(response) => response,
                    Err(panic) => {
                        let err = AppError::Internal(format!("Handler panicked: {}", panic_message(panic.as_ref())));
                        map_error(&err, &rc, &state.ledger)
                    }
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, limit = capture.max_body_bytes, "Request body rejected");
                map_error(&AppError::PayloadTooLarge(capture.max_body_bytes), &rc, &state.ledger)
            }
        };

        let response = finish(&rc, response, capture, started).await;
        let status = response.status().as_u16();
        metrics::record_http_request(method.as_str(), &route, status, started.elapsed());
        tracing::info!(
            status,
            duration_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(log_span)
    .await;

    root.end();
    response
}

/// Post-phase: record the outcome on the root span.
async fn finish(rc: &RequestContext, response: Response, capture: &CaptureConfig, started: Instant) -> Response {
    let status = response.status();
    let mapped = response.extensions().get::<MappedError>().is_some();
    let (parts, body) = response.into_parts();

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to buffer response body");
            Bytes::new()
        }
    };

    let failed = status.is_client_error() || status.is_server_error();
    rc.trace.set_attributes([
        KeyValue::new("http.status_code", i64::from(status.as_u16())),
        KeyValue::new("http.response.size", bytes.len() as i64),
        KeyValue::new("http.response.content_type", header_str(&parts.headers, CONTENT_TYPE.as_str()).to_string()),
        KeyValue::new("http.request.duration_ms", started.elapsed().as_secs_f64() * 1000.0),
        KeyValue::new("error", failed),
    ]);

    if !failed && !bytes.is_empty() {
        let text = String::from_utf8_lossy(&bytes);
        rc.trace.set_attribute(KeyValue::new(
            "http.response.body",
            truncate_body(&text, capture.response_body_chars),
        ));
    }

    if failed {
        if !mapped {
            rc.trace.set_status(Status::error(format!("HTTP {}", status.as_u16())));
        }
    } else {
        rc.trace.set_status(Status::Ok);
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn request_attributes(parts: &Parts, route: &str, request_id: &str, service_name: &str) -> Vec<KeyValue> {
    let headers = &parts.headers;
    let scheme = parts.uri.scheme_str().unwrap_or("http");
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let host = parts
        .uri
        .authority()
        .map(|a| a.as_str())
        .unwrap_or_else(|| header_str(headers, HOST.as_str()));

    let mut attributes = vec![
        KeyValue::new("http.method", parts.method.to_string()),
        KeyValue::new("http.url", format!("{}://{}{}", scheme, host, target)),
        KeyValue::new("http.scheme", scheme.to_string()),
        KeyValue::new("http.target", target.to_string()),
        KeyValue::new("http.route", route.to_string()),
        KeyValue::new("http.user_agent", header_str(headers, USER_AGENT.as_str()).to_string()),
        KeyValue::new("http.request.content_type", header_str(headers, CONTENT_TYPE.as_str()).to_string()),
        KeyValue::new("http.client_ip", client_ip(headers, peer_addr(parts))),
        KeyValue::new("http.request_id", request_id.to_string()),
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("component", "http-server"),
    ];

    if let Some(query) = parts.uri.query() {
        attributes.push(KeyValue::new("http.query_string", query.to_string()));
    }
    if let Some(length) = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
    {
        attributes.push(KeyValue::new("http.request.content_length", length));
    }

    attributes
}

fn request_id(parts: &Parts) -> String {
    parts
        .extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .or_else(|| parts.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

fn captures_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerSageConfig, SimulationConfig};
    use crate::db::Database;
    use crate::observability::Telemetry;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use tower::ServiceExt;

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panic_still_ends_root_span() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let mut config = ServerSageConfig::default();
        config.simulation = SimulationConfig::disabled();
        let db = Database::connect(&config.database).await.unwrap();
        let state = AppState::new(&config, Telemetry::from_provider(provider), db);

        let app = Router::new()
            .route("/boom", get(explode))
            .layer(axum::middleware::from_fn_with_state(state.clone(), isolate_trace))
            .with_state(state);

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, Status::error("Handler panicked: handler exploded"));
        assert!(spans[0].events.events.iter().any(|event| event.name == "exception"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("index out of range");
        assert_eq!(panic_message(payload.as_ref()), "index out of range");

        let payload: Box<dyn Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_only_mutating_methods_capture_bodies() {
        assert!(captures_body(&Method::POST));
        assert!(captures_body(&Method::PATCH));
        assert!(!captures_body(&Method::GET));
        assert!(!captures_body(&Method::DELETE));
    }
}
