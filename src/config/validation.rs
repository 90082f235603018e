//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates in [0, 1], delay ranges ordered, batch sizes > 0)
//! - Validate addresses and URLs before anything binds or connects
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerSageConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServerSageConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerSageConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if !config.database.url.starts_with("sqlite:") {
        errors.push(ValidationError::new("database.url", "only sqlite URLs are supported"));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be greater than 0"));
    }

    let telemetry = &config.telemetry;
    if telemetry.service_name.trim().is_empty() {
        errors.push(ValidationError::new("telemetry.service_name", "must not be empty"));
    }
    if telemetry.enabled && url::Url::parse(&telemetry.otlp_endpoint).is_err() {
        errors.push(ValidationError::new(
            "telemetry.otlp_endpoint",
            format!("'{}' is not a valid URL", telemetry.otlp_endpoint),
        ));
    }
    if telemetry.max_export_batch_size == 0 {
        errors.push(ValidationError::new("telemetry.max_export_batch_size", "must be greater than 0"));
    }
    if telemetry.max_queue_size < telemetry.max_export_batch_size {
        errors.push(ValidationError::new(
            "telemetry.max_queue_size",
            "must be at least max_export_batch_size",
        ));
    }

    if config.capture.max_body_bytes == 0 {
        errors.push(ValidationError::new("capture.max_body_bytes", "must be greater than 0"));
    }

    let sim = &config.simulation;
    if sim.delay_min_ms > sim.delay_max_ms {
        errors.push(ValidationError::new("simulation.delay_min_ms", "must not exceed delay_max_ms"));
    }
    if sim.slow_delay_min_ms > sim.slow_delay_max_ms {
        errors.push(ValidationError::new(
            "simulation.slow_delay_min_ms",
            "must not exceed slow_delay_max_ms",
        ));
    }
    let rates = [
        ("simulation.user_list_failure_rate", sim.user_list_failure_rate),
        ("simulation.recommendation_failure_rate", sim.recommendation_failure_rate),
        ("simulation.payment_failure_rate", sim.payment_failure_rate),
        ("simulation.payment_timeout_rate", sim.payment_timeout_rate),
        ("simulation.inventory_failure_rate", sim.inventory_failure_rate),
        ("simulation.performance_failure_rate", sim.performance_failure_rate),
    ];
    for (field, rate) in rates {
        if !(0.0..=1.0).contains(&rate) {
            errors.push(ValidationError::new(field, format!("{} is outside [0, 1]", rate)));
        }
    }

    if config.alerts.history_limit == 0 {
        errors.push(ValidationError::new("alerts.history_limit", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerSageConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServerSageConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.simulation.payment_failure_rate = 1.5;
        config.simulation.delay_min_ms = 500;
        config.simulation.delay_max_ms = 10;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(errors.len(), 3);
        assert!(fields.contains(&"listener.bind_address"));
        assert!(fields.contains(&"simulation.payment_failure_rate"));
        assert!(fields.contains(&"simulation.delay_min_ms"));
    }

    #[test]
    fn test_otlp_endpoint_only_checked_when_enabled() {
        let mut config = ServerSageConfig::default();
        config.telemetry.otlp_endpoint = "::::".into();
        assert!(validate_config(&config).is_err());

        config.telemetry.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
