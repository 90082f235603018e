use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{AlertLevel, AlertNotification};
use crate::observability::{Component, TraceContext};

const SERVICE: Component = Component::service("AlertService");

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    pub total_alerts: usize,
    pub critical_alerts: usize,
    pub warning_alerts: usize,
    pub general_alerts: usize,
    pub last_updated: DateTime<Utc>,
}

/// In-memory alert history, newest last, bounded per level.
#[derive(Debug, Clone)]
pub struct AlertService {
    history: Arc<DashMap<AlertLevel, VecDeque<AlertNotification>>>,
    limit: usize,
}

impl AlertService {
    pub fn new(limit: usize) -> Self {
        Self {
            history: Arc::new(DashMap::new()),
            limit: limit.max(1),
        }
    }

    pub async fn receive(
        &self,
        cx: &TraceContext,
        level: AlertLevel,
        payload: &serde_json::Value,
    ) -> Result<AlertNotification, AppError> {
        SERVICE
            .call(cx, "receive", |_cx| async move {
                let alert = AlertNotification::from_payload(level, payload);
                {
                    let mut entries = self.history.entry(level).or_default();
                    if entries.len() == self.limit {
                        entries.pop_front();
                    }
                    entries.push_back(alert.clone());
                }

                match level {
                    AlertLevel::Critical => tracing::error!(
                        alert.level = level.key(),
                        alert.title = %alert.title,
                        alert.message = %alert.message,
                        "Critical alert received"
                    ),
                    _ => tracing::warn!(
                        alert.level = level.key(),
                        alert.title = %alert.title,
                        alert.message = %alert.message,
                        "Alert received"
                    ),
                }
                Ok(alert)
            })
            .await
    }

    /// Every stored alert, keyed by level.
    pub fn history(&self) -> BTreeMap<&'static str, Vec<AlertNotification>> {
        self.history
            .iter()
            .map(|entry| (entry.key().key(), entry.value().iter().cloned().collect()))
            .collect()
    }

    pub fn history_for(&self, level: AlertLevel) -> Vec<AlertNotification> {
        self.history
            .get(&level)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.history.clear();
        tracing::info!("Alert history cleared");
    }

    pub fn status(&self) -> AlertStatus {
        let count = |level: AlertLevel| self.history.get(&level).map(|entries| entries.len()).unwrap_or(0);
        let critical_alerts = count(AlertLevel::Critical);
        let warning_alerts = count(AlertLevel::Warning);
        let general_alerts = count(AlertLevel::General);

        AlertStatus {
            total_alerts: critical_alerts + warning_alerts + general_alerts,
            critical_alerts,
            warning_alerts,
            general_alerts,
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Telemetry;
    use opentelemetry::trace::SpanKind;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use serde_json::json;

    #[tokio::test]
    async fn test_history_is_bounded_per_level() {
        let telemetry = Telemetry::from_provider(SdkTracerProvider::builder().build());
        let root = telemetry.start_root("alerts", SpanKind::Server, vec![]);
        let alerts = AlertService::new(2);

        for title in ["a", "b", "c"] {
            alerts
                .receive(root.context(), AlertLevel::Warning, &json!({ "title": title }))
                .await
                .unwrap();
        }
        alerts
            .receive(root.context(), AlertLevel::Critical, &json!({}))
            .await
            .unwrap();
        root.end();

        let warnings: Vec<_> = alerts.history_for(AlertLevel::Warning).into_iter().map(|a| a.title).collect();
        assert_eq!(warnings, vec!["b", "c"]);

        let status = alerts.status();
        assert_eq!(status.total_alerts, 3);
        assert_eq!(status.critical_alerts, 1);
        assert_eq!(status.general_alerts, 0);

        alerts.clear();
        assert!(alerts.history().is_empty());
        assert!(alerts.history_for(AlertLevel::General).is_empty());
    }
}
