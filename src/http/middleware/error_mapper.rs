//! Boundary error mapping.
//!
//! Handlers and extractors return `AppError`; its `IntoResponse` only tags
//! the response with a `PendingError`. This middleware picks the tag up and
//! replaces the response with the mapped one.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::PendingError;
use crate::http::request::RequestContext;
use crate::http::response::map_error;
use crate::http::server::AppState;

pub async fn map_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let rc = req.extensions().get::<RequestContext>().cloned();
    let mut response = next.run(req).await;

    let Some(PendingError(err)) = response.extensions_mut().remove::<PendingError>() else {
        return response;
    };

    match rc {
        Some(rc) => map_error(&err, &rc, &state.ledger),
        None => {
            tracing::error!(error = %err, "Error raised outside a traced request");
            response
        }
    }
}
