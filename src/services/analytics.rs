use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::db::{Database, DbOperation};
use crate::error::AppError;
use crate::models::OrderStatus;
use crate::observability::{Component, ErrorLedger, ErrorSummary, TraceContext};
use crate::repository::{OrderRepository, ProductRepository, UserRepository};
use crate::services::Simulator;

const SERVICE: Component = Component::service("AnalyticsService");

const PING: &str = "SELECT 1";
const LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    pub completed_orders: i64,
    pub timestamp: DateTime<Utc>,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub total_users: i64,
    pub admin_users: i64,
    pub regular_users: i64,
    pub manager_users: i64,
    pub employee_users: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStatistics {
    pub total_products: i64,
    pub low_stock_products: i64,
    pub electronics_category: i64,
    pub clothing_category: i64,
    pub books_category: i64,
    pub inventory_value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub confirmed_orders: i64,
    pub shipped_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub uptime_seconds: u64,
    pub available_processors: usize,
    pub errors_recorded: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyHealth {
    pub status: &'static str,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealth {
    pub overall_status: &'static str,
    pub database: DependencyHealth,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsService {
    users: UserRepository,
    products: ProductRepository,
    orders: OrderRepository,
    db: Database,
    ledger: Arc<ErrorLedger>,
    simulator: Simulator,
    started: Instant,
}

impl AnalyticsService {
    pub fn new(db: Database, ledger: Arc<ErrorLedger>, simulator: Simulator) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            products: ProductRepository::new(db.clone()),
            orders: OrderRepository::new(db.clone()),
            db,
            ledger,
            simulator,
            started: Instant::now(),
        }
    }

    pub async fn dashboard(&self, cx: &TraceContext) -> Result<Dashboard, AppError> {
        SERVICE
            .call(cx, "dashboard", |cx| async move {
                self.simulator.slow_delay().await;
                Ok(Dashboard {
                    total_users: self.users.count(&cx).await?,
                    total_products: self.products.count(&cx).await?,
                    total_orders: self.orders.count(&cx).await?,
                    pending_orders: self.orders.count_by_status(&cx, OrderStatus::Pending).await?,
                    completed_orders: self.orders.count_by_status(&cx, OrderStatus::Delivered).await?,
                    timestamp: Utc::now(),
                    status: "healthy",
                })
            })
            .await
    }

    pub async fn user_statistics(&self, cx: &TraceContext) -> Result<UserStatistics, AppError> {
        SERVICE
            .call(cx, "user_statistics", |cx| async move {
                self.simulator.slow_delay().await;
                Ok(UserStatistics {
                    total_users: self.users.count(&cx).await?,
                    admin_users: self.users.count_by_role(&cx, "ADMIN").await?,
                    regular_users: self.users.count_by_role(&cx, "USER").await?,
                    manager_users: self.users.count_by_role(&cx, "MANAGER").await?,
                    employee_users: self.users.count_by_role(&cx, "EMPLOYEE").await?,
                })
            })
            .await
    }

    pub async fn product_statistics(&self, cx: &TraceContext) -> Result<ProductStatistics, AppError> {
        SERVICE
            .call(cx, "product_statistics", |cx| async move {
                self.simulator.slow_delay().await;
                Ok(ProductStatistics {
                    total_products: self.products.count(&cx).await?,
                    low_stock_products: self.products.count_low_stock(&cx, LOW_STOCK_THRESHOLD).await?,
                    electronics_category: self.products.count_by_category(&cx, "electronics").await?,
                    clothing_category: self.products.count_by_category(&cx, "clothing").await?,
                    books_category: self.products.count_by_category(&cx, "books").await?,
                    inventory_value: self.products.inventory_value(&cx).await?,
                })
            })
            .await
    }

    pub async fn order_statistics(&self, cx: &TraceContext) -> Result<OrderStatistics, AppError> {
        SERVICE
            .call(cx, "order_statistics", |cx| async move {
                self.simulator.slow_delay().await;
                Ok(OrderStatistics {
                    total_orders: self.orders.count(&cx).await?,
                    pending_orders: self.orders.count_by_status(&cx, OrderStatus::Pending).await?,
                    confirmed_orders: self.orders.count_by_status(&cx, OrderStatus::Confirmed).await?,
                    shipped_orders: self.orders.count_by_status(&cx, OrderStatus::Shipped).await?,
                    delivered_orders: self.orders.count_by_status(&cx, OrderStatus::Delivered).await?,
                    cancelled_orders: self.orders.count_by_status(&cx, OrderStatus::Cancelled).await?,
                    total_revenue: self.orders.revenue(&cx).await?,
                })
            })
            .await
    }

    pub async fn performance_metrics(&self, cx: &TraceContext) -> Result<PerformanceMetrics, AppError> {
        SERVICE
            .call(cx, "performance_metrics", |_cx| async move {
                self.simulator.slow_delay().await;
                if self.simulator.fails(self.simulator.config().performance_failure_rate) {
                    return Err(AppError::ExternalService(
                        "Performance monitoring service is unavailable".into(),
                    ));
                }

                Ok(PerformanceMetrics {
                    uptime_seconds: self.started.elapsed().as_secs(),
                    available_processors: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
                    errors_recorded: self.ledger.summary().total_errors,
                    timestamp: Utc::now(),
                })
            })
            .await
    }

    /// Ping the database. A failed ping is reported, not raised.
    pub async fn detailed_health(&self, cx: &TraceContext) -> Result<DetailedHealth, AppError> {
        SERVICE
            .call(cx, "detailed_health", |cx| async move {
                let started = Instant::now();
                let ping = self
                    .db
                    .tracer()
                    .trace(&cx, DbOperation::query("health", PING), self.db.ping())
                    .await;
                let database = DependencyHealth {
                    status: if ping.is_ok() { "UP" } else { "DOWN" },
                    response_time_ms: started.elapsed().as_millis() as u64,
                };

                Ok(DetailedHealth {
                    overall_status: if ping.is_ok() { "UP" } else { "DEGRADED" },
                    database,
                    timestamp: Utc::now(),
                })
            })
            .await
    }

    pub async fn generate_report(
        &self,
        cx: &TraceContext,
        report_type: Option<&str>,
        date_range: Option<&str>,
    ) -> Result<Value, AppError> {
        SERVICE
            .call(cx, "generate_report", |cx| async move {
                let report_type = report_type.map(str::trim).unwrap_or_default();
                if report_type.is_empty() {
                    return Err(AppError::Validation("Report type is required".into()));
                }

                let mut report = json!({
                    "reportType": report_type,
                    "dateRange": date_range,
                    "generatedAt": Utc::now(),
                });

                let details = match report_type.to_lowercase().as_str() {
                    "sales" => json!({
                        "totalSales": self.orders.revenue(&cx).await?,
                        "orderCount": self.orders.count(&cx).await?,
                    }),
                    "users" => json!({
                        "totalUsers": self.users.count(&cx).await?,
                        "adminUsers": self.users.count_by_role(&cx, "ADMIN").await?,
                    }),
                    "products" => json!({
                        "totalProducts": self.products.count(&cx).await?,
                        "lowStockAlerts": self.products.count_low_stock(&cx, LOW_STOCK_THRESHOLD).await?,
                    }),
                    _ => {
                        return Err(AppError::Validation(format!("Unsupported report type: {}", report_type)));
                    }
                };

                if let (Some(report), Value::Object(details)) = (report.as_object_mut(), details) {
                    report.extend(details);
                }
                Ok(report)
            })
            .await
    }

    pub async fn error_summary(&self, cx: &TraceContext) -> Result<ErrorSummary, AppError> {
        SERVICE
            .call(cx, "error_summary", |_cx| async move { Ok(self.ledger.summary()) })
            .await
    }
}

