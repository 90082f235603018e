//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for ServerSage.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerSageConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Database connection settings.
    pub database: DatabaseConfig,

    /// OpenTelemetry span pipeline.
    pub telemetry: TelemetryConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Request/response capture limits for span attributes.
    pub capture: CaptureConfig,

    /// Simulated latency and failure injection.
    pub simulation: SimulationConfig,

    /// In-memory alert history.
    pub alerts: AlertConfig,

    /// Graceful shutdown behaviour.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL.
    pub url: String,

    /// Logical database name reported as `db.name`.
    pub name: String,

    /// Pool size. In-memory databases are always pinned to one connection.
    pub max_connections: u32,

    /// Insert demo users, products and orders on startup.
    pub seed_demo_data: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            name: "serversage".to_string(),
            max_connections: 5,
            seed_demo_data: true,
        }
    }
}

impl DatabaseConfig {
    /// Whether the URL points at a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// OpenTelemetry trace pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Export spans over OTLP. When disabled spans are still created for correlation.
    pub enabled: bool,

    /// `service.name` resource attribute.
    pub service_name: String,

    /// `service.version` resource attribute.
    pub service_version: String,

    /// `deployment.environment` resource attribute.
    pub environment: String,

    /// OTLP gRPC collector endpoint.
    pub otlp_endpoint: String,

    /// Maximum spans per export batch.
    pub max_export_batch_size: usize,

    /// Delay between scheduled exports in milliseconds.
    pub scheduled_delay_ms: u64,

    /// Maximum queued spans before dropping.
    pub max_queue_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "serversage".to_string(),
            service_version: "1.0.0".to_string(),
            environment: "development".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            max_export_batch_size: 512,
            scheduled_delay_ms: 1000,
            max_queue_size: 2048,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "serversage=info,tower_http=info,sqlx=warn".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Limits for request/response capture on the root span.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Characters of request body kept on the span (POST/PUT/PATCH only).
    pub request_body_chars: usize,

    /// Characters of response body kept on the span (status < 400 only).
    pub response_body_chars: usize,

    /// Largest body the interceptor buffers, in bytes.
    pub max_body_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            request_body_chars: 1000,
            response_body_chars: 500,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Simulated latency and random failure rates used by the demo services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Enable random delays.
    pub delays_enabled: bool,

    /// Delay range for user and product operations.
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,

    /// Delay range for order and analytics operations.
    pub slow_delay_min_ms: u64,
    pub slow_delay_max_ms: u64,

    /// How long the timeout scenarios block before failing.
    pub timeout_delay_ms: u64,

    pub user_list_failure_rate: f64,
    pub recommendation_failure_rate: f64,
    pub payment_failure_rate: f64,
    pub payment_timeout_rate: f64,
    pub inventory_failure_rate: f64,
    pub performance_failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delays_enabled: true,
            delay_min_ms: 10,
            delay_max_ms: 100,
            slow_delay_min_ms: 20,
            slow_delay_max_ms: 150,
            timeout_delay_ms: 5000,
            user_list_failure_rate: 0.02,
            recommendation_failure_rate: 0.20,
            payment_failure_rate: 0.15,
            payment_timeout_rate: 0.05,
            inventory_failure_rate: 0.10,
            performance_failure_rate: 0.10,
        }
    }
}

impl SimulationConfig {
    /// Deterministic settings: no delays and no random failures.
    pub fn disabled() -> Self {
        Self {
            delays_enabled: false,
            timeout_delay_ms: 0,
            user_list_failure_rate: 0.0,
            recommendation_failure_rate: 0.0,
            payment_failure_rate: 0.0,
            payment_timeout_rate: 0.0,
            inventory_failure_rate: 0.0,
            performance_failure_rate: 0.0,
            ..Self::default()
        }
    }
}

/// Alert history configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Entries kept per alert type; oldest dropped first.
    pub history_limit: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { history_limit: 100 }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests to drain.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}
