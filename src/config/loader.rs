//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerSageConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerSageConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text, applying environment overrides.
pub fn parse_config(content: &str) -> Result<ServerSageConfig, ConfigError> {
    let mut config: ServerSageConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the supported environment variable overrides.
///
/// The lookup is injected so tests do not have to mutate the process environment.
pub fn apply_env_overrides<F>(config: &mut ServerSageConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = endpoint;
    }
    if let Some(name) = lookup("OTEL_SERVICE_NAME") {
        config.telemetry.service_name = name;
    }
    if let Some(addr) = lookup("SERVERSAGE_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(url) = lookup("SERVERSAGE_DATABASE_URL") {
        config.database.url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_parse_partial_config_uses_defaults() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:3000"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:3000");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.telemetry.max_export_batch_size, 512);
        assert_eq!(config.capture.request_body_chars, 1000);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = parse_config(
            r#"
            [simulation]
            recommendation_failure_rate = 2.0
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("recommendation_failure_rate"));
    }

    #[test]
    fn test_parse_alerts_section() {
        let config = parse_config(
            r#"
            [alerts]
            history_limit = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.alerts.history_limit, 5);

        let err = parse_config("[alerts]\nhistory_limit = 0").unwrap_err();
        assert!(err.to_string().contains("alerts.history_limit"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerSageConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            "OTEL_EXPORTER_OTLP_ENDPOINT" => Some("http://collector:4317".to_string()),
            "SERVERSAGE_DATABASE_URL" => Some("sqlite://data.db".to_string()),
            _ => None,
        });

        assert_eq!(config.telemetry.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.database.url, "sqlite://data.db");
        assert_eq!(config.telemetry.service_name, "serversage");
    }
}
