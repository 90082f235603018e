use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::db::DbOperation;
use crate::error::AppError;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::observability::Component;

const CONTROLLER: Component = Component::controller("HealthController");

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    database: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Liveness plus a database ping; a failed ping answers 503.
async fn health(State(state): State<AppState>, rc: RequestContext) -> Result<(StatusCode, Json<Health>), AppError> {
    let reachable = CONTROLLER
        .call(&rc.trace, "health", |cx| async move {
            let ping = state
                .db
                .tracer()
                .trace(&cx, DbOperation::query("health", "SELECT 1"), state.db.ping())
                .await;
            if let Err(err) = &ping {
                tracing::warn!(error = %err, "Database ping failed");
            }
            Ok(ping.is_ok())
        })
        .await?;

    let (status, health) = if reachable {
        (StatusCode::OK, Health { status: "UP", database: "UP" })
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Health {
                status: "DOWN",
                database: "DOWN",
            },
        )
    };
    Ok((status, Json(health)))
}
