use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::http::extract::QueryParams;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::observability::{Component, ErrorSummary};
use crate::services::analytics::{
    Dashboard, DetailedHealth, OrderStatistics, PerformanceMetrics, ProductStatistics, UserStatistics,
};

const CONTROLLER: Component = Component::controller("AnalyticsController");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportQuery {
    report_type: Option<String>,
    date_range: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users/statistics", get(user_statistics))
        .route("/products/statistics", get(product_statistics))
        .route("/orders/statistics", get(order_statistics))
        .route("/performance/metrics", get(performance_metrics))
        .route("/health/detailed", get(detailed_health))
        .route("/reports/generate", post(generate_report))
        .route("/errors/summary", get(error_summary))
}

async fn dashboard(State(state): State<AppState>, rc: RequestContext) -> Result<Json<Dashboard>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_dashboard", |cx| async move { state.analytics.dashboard(&cx).await })
        .await
        .map(Json)
}

async fn user_statistics(
    State(state): State<AppState>,
    rc: RequestContext,
) -> Result<Json<UserStatistics>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_user_statistics", |cx| async move {
            state.analytics.user_statistics(&cx).await
        })
        .await
        .map(Json)
}

async fn product_statistics(
    State(state): State<AppState>,
    rc: RequestContext,
) -> Result<Json<ProductStatistics>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_product_statistics", |cx| async move {
            state.analytics.product_statistics(&cx).await
        })
        .await
        .map(Json)
}

async fn order_statistics(
    State(state): State<AppState>,
    rc: RequestContext,
) -> Result<Json<OrderStatistics>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_order_statistics", |cx| async move {
            state.analytics.order_statistics(&cx).await
        })
        .await
        .map(Json)
}

async fn performance_metrics(
    State(state): State<AppState>,
    rc: RequestContext,
) -> Result<Json<PerformanceMetrics>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_performance_metrics", |cx| async move {
            state.analytics.performance_metrics(&cx).await
        })
        .await
        .map(Json)
}

async fn detailed_health(
    State(state): State<AppState>,
    rc: RequestContext,
) -> Result<Json<DetailedHealth>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_detailed_health", |cx| async move {
            state.analytics.detailed_health(&cx).await
        })
        .await
        .map(Json)
}

async fn generate_report(
    State(state): State<AppState>,
    rc: RequestContext,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<Value>, AppError> {
    CONTROLLER
        .call(&rc.trace, "generate_report", |cx| async move {
            state
                .analytics
                .generate_report(&cx, query.report_type.as_deref(), query.date_range.as_deref())
                .await
        })
        .await
        .map(Json)
}

async fn error_summary(State(state): State<AppState>, rc: RequestContext) -> Result<Json<ErrorSummary>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_error_summary", |cx| async move {
            state.analytics.error_summary(&cx).await
        })
        .await
        .map(Json)
}
