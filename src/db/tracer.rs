//! Client spans around database calls.
//!
//! # Responsibilities
//! - Describe a statement (operation kind, table, SQL, bound parameters)
//! - Open a `db.<operation>` CLIENT span under the caller's context
//! - Record sanitized statement text, duration and row count
//! - Record failures on the span and in the log, then hand the error back
//!
//! # Design Decisions
//! - Generic over the call's output and error types: the tracer never
//!   converts, wraps or swallows the driver's error
//! - Secrets are redacted before any statement text leaves this module
//! - Statement text is truncated so attributes stay bounded

use std::fmt::Display;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Instant;

use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::KeyValue;
use regex::Regex;
use sqlx::sqlite::SqliteQueryResult;

use crate::observability::metrics;
use crate::observability::tracing::TraceContext;

/// Statements longer than this are truncated before being attached to spans.
pub const MAX_STATEMENT_CHARS: usize = 500;
const TRUNCATION_MARKER: &str = "... [TRUNCATED]";

static SINGLE_QUOTED_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(password|token|secret|key)\s*=\s*'[^']*'").expect("secret pattern is valid")
});

static DOUBLE_QUOTED_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(password|token|secret|key)\s*=\s*"[^"]*""#).expect("secret pattern is valid")
});

/// Redact secret assignments and truncate long statements.
///
/// Applying this twice gives the same result as applying it once.
pub fn sanitize(statement: &str) -> String {
    let redacted = SINGLE_QUOTED_SECRET.replace_all(statement, "${1}='***'");
    let redacted = DOUBLE_QUOTED_SECRET.replace_all(&redacted, "${1}=\"***\"");

    match redacted.char_indices().nth(MAX_STATEMENT_CHARS) {
        Some((cut, _)) => format!("{}{}", &redacted[..cut], TRUNCATION_MARKER),
        None => redacted.into_owned(),
    }
}

/// Leading SQL keyword, upper-cased, or `OTHER`.
pub fn query_type(statement: &str) -> &'static str {
    let keyword = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    match keyword.as_str() {
        "SELECT" => "SELECT",
        "INSERT" => "INSERT",
        "UPDATE" => "UPDATE",
        "DELETE" => "DELETE",
        "CREATE" => "CREATE",
        "DROP" => "DROP",
        "ALTER" => "ALTER",
        _ => "OTHER",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Update,
    BatchUpdate,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Update => "update",
            OperationKind::BatchUpdate => "batch_update",
        }
    }

    fn span_name(&self) -> &'static str {
        match self {
            OperationKind::Query => "db.query",
            OperationKind::Update => "db.update",
            OperationKind::BatchUpdate => "db.batch_update",
        }
    }
}

/// One statement about to be executed.
#[derive(Debug, Clone)]
pub struct DbOperation {
    kind: OperationKind,
    table: &'static str,
    sql: &'static str,
    params: Vec<String>,
    batch_size: Option<usize>,
}

impl DbOperation {
    pub fn query(table: &'static str, sql: &'static str) -> Self {
        Self::new(OperationKind::Query, table, sql)
    }

    pub fn update(table: &'static str, sql: &'static str) -> Self {
        Self::new(OperationKind::Update, table, sql)
    }

    pub fn batch_update(table: &'static str, sql: &'static str, operations: usize) -> Self {
        Self {
            batch_size: Some(operations),
            ..Self::new(OperationKind::BatchUpdate, table, sql)
        }
    }

    fn new(kind: OperationKind, table: &'static str, sql: &'static str) -> Self {
        Self {
            kind,
            table,
            sql,
            params: Vec::new(),
            batch_size: None,
        }
    }

    /// Append a bound parameter value to the debug statement text.
    pub fn param(mut self, value: impl Display) -> Self {
        self.params.push(value.to_string());
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// SQL with parameters or batch size appended.
    pub fn statement(&self) -> String {
        if let Some(n) = self.batch_size {
            format!("{} [BATCH: {} operations]", self.sql, n)
        } else if self.params.is_empty() {
            self.sql.to_string()
        } else {
            format!("{} [PARAMS: {}]", self.sql, self.params.join(", "))
        }
    }
}

/// Row-count extraction for traced results.
pub trait RowCount {
    fn row_count(&self) -> Option<u64>;

    fn result_type(&self) -> &'static str;
}

impl<T> RowCount for Vec<T> {
    fn row_count(&self) -> Option<u64> {
        Some(self.len() as u64)
    }

    fn result_type(&self) -> &'static str {
        "list"
    }
}

impl<T> RowCount for Option<T> {
    fn row_count(&self) -> Option<u64> {
        Some(u64::from(self.is_some()))
    }

    fn result_type(&self) -> &'static str {
        "optional"
    }
}

impl RowCount for SqliteQueryResult {
    fn row_count(&self) -> Option<u64> {
        Some(self.rows_affected())
    }

    fn result_type(&self) -> &'static str {
        "update_count"
    }
}

impl RowCount for i64 {
    fn row_count(&self) -> Option<u64> {
        Some(1)
    }

    fn result_type(&self) -> &'static str {
        "scalar"
    }
}

impl RowCount for f64 {
    fn row_count(&self) -> Option<u64> {
        Some(1)
    }

    fn result_type(&self) -> &'static str {
        "scalar"
    }
}

impl RowCount for () {
    fn row_count(&self) -> Option<u64> {
        None
    }

    fn result_type(&self) -> &'static str {
        "none"
    }
}

/// Wraps database calls in client spans.
#[derive(Debug, Clone)]
pub struct DbTracer {
    system: &'static str,
    db_name: String,
}

impl DbTracer {
    pub fn new(system: &'static str, db_name: impl Into<String>) -> Self {
        Self {
            system,
            db_name: db_name.into(),
        }
    }

    /// Await `call` inside a `db.<operation>` span and return its result as-is.
    pub async fn trace<T, E, Fut>(&self, parent: &TraceContext, op: DbOperation, call: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        T: RowCount,
        E: std::error::Error,
    {
        let statement = op.statement();
        let sanitized = sanitize(&statement);

        let guard = parent.start_child(
            op.kind.span_name(),
            SpanKind::Client,
            vec![
                KeyValue::new("db.system", self.system),
                KeyValue::new("db.name", self.db_name.clone()),
                KeyValue::new("db.operation.type", op.kind.as_str()),
                KeyValue::new("db.table", op.table),
                KeyValue::new("db.statement", sanitized.clone()),
                KeyValue::new("db.query.sanitized", sanitized.clone()),
                KeyValue::new("db.query.length", statement.chars().count() as i64),
                KeyValue::new("db.query.type", query_type(op.sql)),
            ],
        );

        let started = Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();

        let span = guard.context();
        span.set_attribute(KeyValue::new("db.query.duration_ms", elapsed.as_secs_f64() * 1000.0));

        match &result {
            Ok(value) => {
                if let Some(rows) = value.row_count() {
                    span.set_attribute(KeyValue::new("db.query.row_count", rows as i64));
                }
                span.set_attribute(KeyValue::new("db.result.type", value.result_type()));
                span.set_status(Status::Ok);
                metrics::record_db_operation(op.kind.as_str(), op.table, "success", elapsed);
            }
            Err(err) => {
                span.record_error(err);
                span.set_status(Status::error(format!("Query execution failed: {}", err)));
                span.set_attributes([
                    KeyValue::new("error", true),
                    KeyValue::new("error.type", std::any::type_name::<E>()),
                    KeyValue::new("error.message", err.to_string()),
                    KeyValue::new("db.error.query", sanitized.clone()),
                    KeyValue::new("db.error.operation", op.kind.as_str()),
                ]);
                metrics::record_db_operation(op.kind.as_str(), op.table, "error", elapsed);
                tracing::error!(
                    db.operation = op.kind.as_str(),
                    db.table = op.table,
                    db.statement = %sanitized,
                    duration_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "Database operation failed"
                );
            }
        }

        guard.end();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::tracing::Telemetry;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use std::fmt;

    #[derive(Debug, PartialEq)]
    struct DriverError(&'static str);

    impl fmt::Display for DriverError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for DriverError {}

    fn telemetry() -> (Telemetry, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (Telemetry::from_provider(provider), exporter)
    }

    fn attr(span: &opentelemetry_sdk::trace::SpanData, key: &str) -> Option<String> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.as_str().into_owned())
    }

    #[test]
    fn test_sanitize_redacts_secrets() {
        let sql = "UPDATE users SET password = 'hunter2', api_key=\"abc\" WHERE token='t0k'";
        let sanitized = sanitize(sql);

        assert!(!sanitized.contains("hunter2"));
        assert!(!sanitized.contains("abc"));
        assert!(!sanitized.contains("t0k"));
        assert!(sanitized.contains("password='***'"));
        assert!(sanitized.contains("key=\"***\""));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let long = format!("SELECT * FROM t WHERE secret='s' AND x IN ({})", "1, ".repeat(300));
        let samples = [
            "SELECT id FROM users WHERE id = 1",
            "UPDATE users SET password='a' WHERE TOKEN = 'b'",
            "INSERT INTO creds (key) VALUES (1) -- key=\"x\"",
            long.as_str(),
        ];

        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not stable for {sample}");
        }
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let sql = format!("SELECT '{}'", "é".repeat(600));
        let sanitized = sanitize(&sql);

        assert!(sanitized.ends_with(TRUNCATION_MARKER));
        assert_eq!(sanitized.chars().count(), MAX_STATEMENT_CHARS + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_statement_text() {
        let op = DbOperation::query("users", "SELECT * FROM users WHERE id = ?").param(5);
        assert_eq!(op.statement(), "SELECT * FROM users WHERE id = ? [PARAMS: 5]");

        let op = DbOperation::batch_update("users", "INSERT INTO users VALUES (?)", 3);
        assert_eq!(op.statement(), "INSERT INTO users VALUES (?) [BATCH: 3 operations]");

        assert_eq!(query_type("  select 1"), "SELECT");
        assert_eq!(query_type("PRAGMA foreign_keys"), "OTHER");
    }

    #[tokio::test]
    async fn test_failure_propagates_original_error() {
        let (telemetry, exporter) = telemetry();
        let tracer = DbTracer::new("sqlite", "test");
        let root = telemetry.start_root("root", SpanKind::Server, vec![]);

        let result: Result<Vec<i64>, DriverError> = tracer
            .trace(
                root.context(),
                DbOperation::update("users", "DELETE FROM users WHERE id = ?").param(1),
                async { Err(DriverError("disk I/O error")) },
            )
            .await;
        root.end();

        assert_eq!(result, Err(DriverError("disk I/O error")));
        let spans = exporter.get_finished_spans().unwrap();
        let span = spans.iter().find(|s| s.name == "db.update").unwrap();
        assert_eq!(span.span_kind, SpanKind::Client);
        assert_eq!(span.status, Status::error("Query execution failed: disk I/O error"));
        assert_eq!(attr(span, "db.error.operation").as_deref(), Some("update"));
        assert!(span.events.events.iter().any(|e| e.name == "exception"));
    }

    #[tokio::test]
    async fn test_success_records_row_count() {
        let (telemetry, exporter) = telemetry();
        let tracer = DbTracer::new("sqlite", "test");
        let root = telemetry.start_root("root", SpanKind::Server, vec![]);

        let rows = tracer
            .trace(
                root.context(),
                DbOperation::query("users", "SELECT id FROM users"),
                async { Ok::<_, DriverError>(vec![1_i64, 2, 3]) },
            )
            .await
            .unwrap();
        root.end();

        assert_eq!(rows, vec![1, 2, 3]);
        let spans = exporter.get_finished_spans().unwrap();
        let span = spans.iter().find(|s| s.name == "db.query").unwrap();
        assert_eq!(span.status, Status::Ok);
        assert_eq!(attr(span, "db.query.row_count").as_deref(), Some("3"));
        assert_eq!(attr(span, "db.result.type").as_deref(), Some("list"));
        assert_eq!(attr(span, "db.query.type").as_deref(), Some("SELECT"));
    }
}
