use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::error::AppError;
use crate::http::extract::{Param, ValidatedJson};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::models::{AlertLevel, AlertNotification};
use crate::observability::Component;
use crate::services::alerts::AlertStatus;

const CONTROLLER: Component = Component::controller("AlertController");

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(receive_alert))
        .route("/critical", post(receive_critical_alert))
        .route("/warning", post(receive_warning_alert))
        .route("/history", get(alert_history).delete(clear_alert_history))
        .route("/history/{kind}", get(alert_history_by_type))
        .route("/status", get(alert_status))
}

async fn store(
    state: AppState,
    rc: &RequestContext,
    method: &'static str,
    level: AlertLevel,
    payload: Value,
) -> Result<(), AppError> {
    CONTROLLER
        .call(&rc.trace, method, |cx| async move {
            state.alerts.receive(&cx, level, &payload).await.map(|_| ())
        })
        .await
}

async fn receive_alert(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(payload): ValidatedJson<Value>,
) -> Result<&'static str, AppError> {
    store(state, &rc, "receive_alert", AlertLevel::General, payload).await?;
    Ok("Alert received successfully")
}

async fn receive_critical_alert(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(payload): ValidatedJson<Value>,
) -> Result<&'static str, AppError> {
    store(state, &rc, "receive_critical_alert", AlertLevel::Critical, payload).await?;
    Ok("Critical alert received successfully")
}

async fn receive_warning_alert(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(payload): ValidatedJson<Value>,
) -> Result<&'static str, AppError> {
    store(state, &rc, "receive_warning_alert", AlertLevel::Warning, payload).await?;
    Ok("Warning alert received successfully")
}

async fn alert_history(
    State(state): State<AppState>,
    rc: RequestContext,
) -> Result<Json<BTreeMap<&'static str, Vec<AlertNotification>>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_alert_history", |_cx| async move { Ok(state.alerts.history()) })
        .await
        .map(Json)
}

/// Unknown types have no history rather than being an error.
async fn alert_history_by_type(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(kind): Param<String>,
) -> Result<Json<Vec<AlertNotification>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_alert_history_by_type", |_cx| async move {
            Ok(kind
                .parse::<AlertLevel>()
                .map(|level| state.alerts.history_for(level))
                .unwrap_or_default())
        })
        .await
        .map(Json)
}

async fn clear_alert_history(State(state): State<AppState>, rc: RequestContext) -> Result<&'static str, AppError> {
    CONTROLLER
        .call(&rc.trace, "clear_alert_history", |_cx| async move {
            state.alerts.clear();
            Ok(())
        })
        .await?;
    Ok("Alert history cleared successfully")
}

async fn alert_status(State(state): State<AppState>, rc: RequestContext) -> Result<Json<AlertStatus>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_alert_status", |_cx| async move { Ok(state.alerts.status()) })
        .await
        .map(Json)
}
