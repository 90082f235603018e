//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, errors, database operations)
//! - Expose Prometheus-compatible metrics endpoint
//! - Provide the single recording function per signal used by every layer
//!
//! # Metrics
//! - `serversage_http_requests_total` (counter): requests by method, route, status
//! - `serversage_http_request_duration_seconds` (histogram): request latency
//! - `serversage_database_operations_total` (counter): db calls by operation, table, outcome
//! - `serversage_database_operation_duration_seconds` (histogram): db latency
//! - `serversage_errors_total` (counter): errors by code, component, type, operation
//! - `serversage_method_duration_seconds` (histogram): instrumented method latency
//! - `serversage_{users,products,orders}_total` (gauge): entity counts
//! - `serversage_active_requests` (gauge): in-flight requests
//!
//! # Design Decisions
//! - Labels are bounded: routes are normalized before they reach this module
//! - Recording goes through the `metrics` facade; instruments are atomic and
//!   safe under concurrent writers
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed HTTP request.
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    let status = status.to_string();
    metrics::counter!(
        "serversage_http_requests_total",
        "method" => method.to_owned(),
        "route" => route.to_owned(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "serversage_http_request_duration_seconds",
        "method" => method.to_owned(),
        "route" => route.to_owned(),
        "status" => status
    )
    .record(duration.as_secs_f64());
}

/// Record one traced database operation.
pub fn record_db_operation(operation: &'static str, table: &'static str, outcome: &'static str, duration: Duration) {
    metrics::counter!(
        "serversage_database_operations_total",
        "operation" => operation,
        "table" => table,
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "serversage_database_operation_duration_seconds",
        "operation" => operation,
        "table" => table,
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());
}

/// Count one error.
pub fn record_error(error_code: &'static str, component: &'static str, exception_type: &'static str, operation: &str) {
    metrics::counter!(
        "serversage_errors_total",
        "error_code" => error_code,
        "component" => component,
        "exception_type" => exception_type,
        "operation" => operation.to_owned()
    )
    .increment(1);
}

/// Record the duration of an instrumented controller/service/repository call.
pub fn record_method(
    layer: &'static str,
    class: &'static str,
    method: &'static str,
    outcome: &'static str,
    duration: Duration,
) {
    metrics::histogram!(
        "serversage_method_duration_seconds",
        "layer" => layer,
        "class" => class,
        "method" => method,
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());
}

/// Entities with a count gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Users,
    Products,
    Orders,
}

impl Entity {
    fn metric_name(self) -> &'static str {
        match self {
            Entity::Users => "serversage_users_total",
            Entity::Products => "serversage_products_total",
            Entity::Orders => "serversage_orders_total",
        }
    }
}

/// Set an entity gauge to an absolute value.
pub fn set_entity_count(entity: Entity, count: i64) {
    metrics::gauge!(entity.metric_name()).set(count as f64);
}

/// Move an entity gauge up or down.
pub fn adjust_entity_count(entity: Entity, delta: i64) {
    let gauge = metrics::gauge!(entity.metric_name());
    if delta >= 0 {
        gauge.increment(delta as f64);
    } else {
        gauge.decrement(delta.unsigned_abs() as f64);
    }
}

/// Track in-flight requests.
pub fn record_request_started() {
    metrics::gauge!("serversage_active_requests").increment(1.0);
}

pub fn record_request_finished() {
    metrics::gauge!("serversage_active_requests").decrement(1.0);
}
