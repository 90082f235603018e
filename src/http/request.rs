//! Request-scoped state and request inspection helpers.
//!
//! # Responsibilities
//! - Generate a request id (UUID v4) when the client did not send one
//! - Derive bounded route labels from the matched route template
//! - Resolve the client address behind proxies
//! - Expose the per-request `RequestContext` to handlers
//!
//! # Design Decisions
//! - Request id added as early as possible for tracing
//! - `RequestContext` is created by the trace isolation middleware and lives
//!   in request extensions; it is owned by exactly one request

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, MatchedPath};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::AppError;
use crate::observability::TraceContext;

/// Header carrying the request id.
pub const X_REQUEST_ID: &str = "x-request-id";

const TRUNCATION_SUFFIX: &str = "... (truncated)";

/// Issues UUID v4 request ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Route label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Bounded route label: the matched route template (`/api/orders/{id}`), or
/// [`UNMATCHED_ROUTE`] when routing found nothing.
pub fn route_label(parts: &Parts) -> String {
    parts
        .extensions
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_body(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_SUFFIX),
        None => text.to_string(),
    }
}

/// First `X-Forwarded-For` entry, else `X-Real-IP`, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Peer address recorded by `into_make_service_with_connect_info`, if any.
pub fn peer_addr(parts: &Parts) -> Option<SocketAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Everything a handler needs to know about the request it serves.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Root span of this request.
    pub trace: TraceContext,
    pub method: Method,
    pub path: String,
    pub route: String,
    pub request_id: String,
}

impl RequestContext {
    /// Path as reported in error bodies.
    pub fn path_description(&self) -> String {
        format!("uri={}", self.path)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal("request context missing".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrouted_request_gets_fixed_label() {
        let (parts, _) = Request::builder()
            .uri("/api/nowhere/67e55044-10b1-426f-9247-bb680e5fe0c8")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(route_label(&parts), UNMATCHED_ROUTE);
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short", 10), "short");
        assert_eq!(truncate_body("abcdef", 3), "abc... (truncated)");
        assert_eq!(truncate_body("ééé", 2), "éé... (truncated)");
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.5"));
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.5");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let req = Request::new(());
        let mut make = MakeRequestUuid;
        let a = make.make_request_id(&req).unwrap();
        let b = make.make_request_id(&req).unwrap();
        assert_ne!(a.header_value(), b.header_value());
    }
}
