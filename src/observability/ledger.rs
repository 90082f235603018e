//! In-process tally of mapped errors, served by the error summary endpoint.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::Classification;

/// Counts of errors that reached the boundary mapper.
#[derive(Debug, Default)]
pub struct ErrorLedger {
    total: AtomicU64,
    by_code: DashMap<&'static str, u64>,
    by_type: DashMap<&'static str, u64>,
    by_component: DashMap<&'static str, u64>,
    last_error_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of the ledger.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub total_errors: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub errors_by_code: BTreeMap<String, u64>,
    pub errors_by_type: BTreeMap<String, u64>,
    pub errors_by_component: BTreeMap<String, u64>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, classification: &Classification) {
        self.total.fetch_add(1, Ordering::Relaxed);
        *self.by_code.entry(classification.code).or_insert(0) += 1;
        *self.by_type.entry(classification.exception_type).or_insert(0) += 1;
        *self.by_component.entry(classification.component).or_insert(0) += 1;
        if let Ok(mut last) = self.last_error_at.lock() {
            *last = Some(Utc::now());
        }
    }

    pub fn summary(&self) -> ErrorSummary {
        let collect = |map: &DashMap<&'static str, u64>| {
            map.iter()
                .map(|entry| (entry.key().to_string(), *entry.value()))
                .collect::<BTreeMap<_, _>>()
        };

        let errors_by_code = collect(&self.by_code);
        let server_errors = crate::error::server_error_codes()
            .filter_map(|code| errors_by_code.get(code))
            .sum::<u64>();
        let total_errors = self.total.load(Ordering::Relaxed);

        ErrorSummary {
            total_errors,
            client_errors: total_errors.saturating_sub(server_errors),
            server_errors,
            errors_by_type: collect(&self.by_type),
            errors_by_component: collect(&self.by_component),
            errors_by_code,
            last_error_at: self.last_error_at.lock().ok().and_then(|last| *last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_summary_splits_client_and_server_errors() {
        let ledger = ErrorLedger::new();
        ledger.record(AppError::RateLimit("x".into()).classification());
        ledger.record(AppError::RateLimit("y".into()).classification());
        ledger.record(AppError::DatabaseConnection("z".into()).classification());

        let summary = ledger.summary();
        assert_eq!(summary.total_errors, 3);
        assert_eq!(summary.server_errors, 1);
        assert_eq!(summary.client_errors, 2);
        assert_eq!(summary.errors_by_code.get("RATE_LIMIT_EXCEEDED"), Some(&2));
        assert_eq!(summary.errors_by_type.get("DatabaseConnectionException"), Some(&1));
        assert!(summary.last_error_at.is_some());
    }

    #[test]
    fn test_empty_ledger() {
        let summary = ErrorLedger::new().summary();
        assert_eq!(summary.total_errors, 0);
        assert!(summary.errors_by_code.is_empty());
        assert!(summary.last_error_at.is_none());
    }
}
