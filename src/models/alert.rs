use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Alert channel a webhook was posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    General,
    Critical,
    Warning,
}

impl AlertLevel {
    pub const ALL: [AlertLevel; 3] = [AlertLevel::General, AlertLevel::Critical, AlertLevel::Warning];

    /// History key.
    pub fn key(&self) -> &'static str {
        match self {
            AlertLevel::General => "general",
            AlertLevel::Critical => "critical",
            AlertLevel::Warning => "warning",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlertLevel::ALL
            .into_iter()
            .find(|level| level.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown alert type '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertNotification {
    #[serde(rename = "type")]
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertNotification {
    /// Build from a webhook payload, tolerating missing fields.
    pub fn from_payload(level: AlertLevel, payload: &serde_json::Value) -> Self {
        let field = |name: &str, default: &str| match payload.get(name) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => default.to_string(),
        };

        Self {
            level,
            title: field("title", "Unknown Alert"),
            message: field("message", "No message provided"),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_payload_defaults() {
        let alert = AlertNotification::from_payload(AlertLevel::Warning, &json!({"severity": 3}));
        assert_eq!(alert.title, "Unknown Alert");
        assert_eq!(alert.message, "No message provided");
    }

    #[test]
    fn test_from_payload_stringifies_non_strings() {
        let alert = AlertNotification::from_payload(
            AlertLevel::Critical,
            &json!({"title": "CPU", "message": 95}),
        );
        assert_eq!(alert.title, "CPU");
        assert_eq!(alert.message, "95");
    }
}
