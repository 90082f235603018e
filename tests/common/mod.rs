//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use opentelemetry::trace::SpanId;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use serversage::config::ServerSageConfig;
use serversage::config::SimulationConfig;
use serversage::db::Database;
use serversage::http::HttpServer;
use serversage::lifecycle::Shutdown;
use serversage::observability::Telemetry;
use tower::ServiceExt;

/// Deterministic config: in-memory database with demo data, no delays, no
/// random failures, no exporters.
pub fn test_config() -> ServerSageConfig {
    let mut config = ServerSageConfig::default();
    config.database.url = "sqlite::memory:".into();
    config.database.seed_demo_data = true;
    config.telemetry.enabled = false;
    config.observability.metrics_enabled = false;
    config.simulation = SimulationConfig::disabled();
    config
}

/// Telemetry whose finished spans land in the returned exporter.
pub fn in_memory_telemetry() -> (Telemetry, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (Telemetry::from_provider(provider), exporter)
}

/// In-process app for `oneshot` calls.
pub struct TestApp {
    pub router: Router,
    pub exporter: InMemorySpanExporter,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: ServerSageConfig) -> TestApp {
    let (telemetry, exporter) = in_memory_telemetry();
    let db = Database::connect(&config.database).await.unwrap();
    let router = HttpServer::new(&config, telemetry, db).into_router();
    TestApp { router, exporter }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<serde_json::Value>) -> Reply {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply { status, headers, body }
    }

    pub async fn get(&self, uri: &str) -> Reply {
        self.request(Method::GET, uri, None).await
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap()
    }

    pub fn root_spans(&self) -> Vec<SpanData> {
        self.spans()
            .into_iter()
            .filter(|span| span.parent_span_id == SpanId::INVALID)
            .collect()
    }
}

/// Start a live server on `addr`. Trigger the returned `Shutdown` to stop it.
pub async fn start_server(addr: SocketAddr) -> (Shutdown, InMemorySpanExporter) {
    let mut config = test_config();
    config.listener.bind_address = addr.to_string();

    let (telemetry, exporter) = in_memory_telemetry();
    let db = Database::connect(&config.database).await.unwrap();
    let server = HttpServer::new(&config, telemetry, db);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    (shutdown, exporter)
}

pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.to_string())
}
