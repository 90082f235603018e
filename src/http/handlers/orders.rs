use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::http::extract::{Param, QueryParams, ValidatedJson};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::models::{NewOrder, Order, OrderRequest, OrderStatus};
use crate::observability::Component;
use crate::services::orders::PaymentReceipt;

const CONTROLLER: Component = Component::controller("OrderController");

const DEFAULT_HIGH_VALUE_THRESHOLD: f64 = 1000.0;

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ThresholdQuery {
    threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DateRangeQuery {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct PaymentQuery {
    amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryQuery {
    product_id: i64,
    quantity: i64,
}

#[derive(Debug, Serialize)]
struct InventoryCheck {
    available: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/high-value", get(list_high_value_orders))
        .route("/date-range", get(list_orders_by_date_range))
        .route("/inventory-check", get(check_inventory))
        .route("/user/{user_id}", get(list_orders_by_user))
        .route("/user/{user_id}/total", get(get_user_order_total))
        .route("/status/{status}", get(list_orders_by_status))
        .route("/status/{status}/count", get(count_orders_by_status))
        .route("/{id}", get(get_order).delete(cancel_order))
        .route("/{id}/status", patch(update_order_status))
        .route("/{id}/payment", post(process_payment))
}

fn parse_status(value: &str) -> Result<OrderStatus, AppError> {
    value
        .parse::<OrderStatus>()
        .map_err(|err| AppError::IllegalArgument(err.to_string()))
}

/// Accepts RFC 3339, a local ISO date-time, or a bare date (midnight UTC).
fn parse_date(value: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(at.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| AppError::IllegalArgument(format!("Invalid date: {}", value)))
}

async fn list_orders(State(state): State<AppState>, rc: RequestContext) -> Result<Json<Vec<Order>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_all_orders", |cx| async move { state.orders.list(&cx).await })
        .await
        .map(Json)
}

async fn get_order(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
) -> Result<Json<Order>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_order_by_id", |cx| async move { state.orders.get(&cx, id).await })
        .await
        .map(Json)
}

async fn create_order(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(req): ValidatedJson<OrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = CONTROLLER
        .call(&rc.trace, "create_order", |cx| async move {
            state.orders.place(&cx, NewOrder::from(req)).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn update_order_status(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
    QueryParams(query): QueryParams<StatusQuery>,
) -> Result<Json<Order>, AppError> {
    CONTROLLER
        .call(&rc.trace, "update_order_status", |cx| async move {
            let status = parse_status(&query.status)?;
            state.orders.update_status(&cx, id, status).await
        })
        .await
        .map(Json)
}

async fn cancel_order(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
) -> Result<&'static str, AppError> {
    CONTROLLER
        .call(&rc.trace, "cancel_order", |cx| async move { state.orders.cancel(&cx, id).await })
        .await?;
    Ok("Order cancelled successfully")
}

async fn list_orders_by_user(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(user_id): Param<i64>,
) -> Result<Json<Vec<Order>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_orders_by_user", |cx| async move {
            state.orders.list_by_user(&cx, user_id).await
        })
        .await
        .map(Json)
}

async fn get_user_order_total(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(user_id): Param<i64>,
) -> Result<Json<f64>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_user_order_total", |cx| async move {
            state.orders.total_by_user(&cx, user_id).await
        })
        .await
        .map(Json)
}

async fn list_orders_by_status(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(status): Param<String>,
) -> Result<Json<Vec<Order>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_orders_by_status", |cx| async move {
            state.orders.list_by_status(&cx, parse_status(&status)?).await
        })
        .await
        .map(Json)
}

async fn count_orders_by_status(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(status): Param<String>,
) -> Result<Json<i64>, AppError> {
    CONTROLLER
        .call(&rc.trace, "count_orders_by_status", |cx| async move {
            state.orders.count_by_status(&cx, parse_status(&status)?).await
        })
        .await
        .map(Json)
}

async fn list_high_value_orders(
    State(state): State<AppState>,
    rc: RequestContext,
    QueryParams(query): QueryParams<ThresholdQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let threshold = query.threshold.unwrap_or(DEFAULT_HIGH_VALUE_THRESHOLD);
    CONTROLLER
        .call(&rc.trace, "get_high_value_orders", |cx| async move {
            state.orders.list_high_value(&cx, threshold).await
        })
        .await
        .map(Json)
}

async fn list_orders_by_date_range(
    State(state): State<AppState>,
    rc: RequestContext,
    QueryParams(query): QueryParams<DateRangeQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_orders_by_date_range", |cx| async move {
            let start = parse_date(&query.start_date)?;
            let end = parse_date(&query.end_date)?;
            state.orders.list_by_date_range(&cx, start, end).await
        })
        .await
        .map(Json)
}

async fn process_payment(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
    QueryParams(query): QueryParams<PaymentQuery>,
) -> Result<Json<PaymentReceipt>, AppError> {
    CONTROLLER
        .call(&rc.trace, "process_payment", |cx| async move {
            state.orders.process_payment(&cx, id, query.amount).await
        })
        .await
        .map(Json)
}

async fn check_inventory(
    State(state): State<AppState>,
    rc: RequestContext,
    QueryParams(query): QueryParams<InventoryQuery>,
) -> Result<Json<InventoryCheck>, AppError> {
    CONTROLLER
        .call(&rc.trace, "check_inventory", |cx| async move {
            state
                .orders
                .check_inventory(&cx, query.product_id, query.quantity)
                .await
        })
        .await
        .map(|available| Json(InventoryCheck { available }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 7, 5, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2024-07-05").unwrap(), midnight);
        assert_eq!(parse_date("2024-07-05T00:00:00").unwrap(), midnight);
        assert_eq!(parse_date("2024-07-05T02:00:00+02:00").unwrap(), midnight);
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_unknown_status_is_illegal_argument() {
        assert_eq!(parse_status("shipped").unwrap(), OrderStatus::Shipped);
        let err = parse_status("LOST").unwrap_err();
        assert_eq!(err.classification().code, "ILLEGAL_ARGUMENT");
    }
}
