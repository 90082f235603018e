use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppError;
use crate::http::extract::{Param, QueryParams, ValidatedJson};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::models::{NewUser, User, UserRequest};
use crate::observability::Component;
use crate::services::users::UserProfile;

const CONTROLLER: Component = Component::controller("UserController");

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    keyword: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/async", post(create_user_async))
        .route("/batch", post(create_users_batch))
        .route("/search", get(search_users))
        .route("/email/{email}", get(get_user_by_email))
        .route("/role/{role}", get(list_users_by_role))
        .route("/role/{role}/count", get(count_users_by_role))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/profile", get(get_user_profile))
}

async fn list_users(State(state): State<AppState>, rc: RequestContext) -> Result<Json<Vec<User>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_all_users", |cx| async move { state.users.list(&cx).await })
        .await
        .map(Json)
}

async fn get_user(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
) -> Result<Json<User>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_user_by_id", |cx| async move { state.users.get(&cx, id).await })
        .await
        .map(Json)
}

async fn create_user(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(req): ValidatedJson<UserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = CONTROLLER
        .call(&rc.trace, "create_user", |cx| async move {
            state.users.create(&cx, NewUser::from(req)).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn create_user_async(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(req): ValidatedJson<UserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = CONTROLLER
        .call(&rc.trace, "create_user_async", |cx| async move {
            state.users.create_in_background(&cx, NewUser::from(req)).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
    ValidatedJson(req): ValidatedJson<UserRequest>,
) -> Result<Json<User>, AppError> {
    CONTROLLER
        .call(&rc.trace, "update_user", |cx| async move {
            state.users.update(&cx, id, NewUser::from(req)).await
        })
        .await
        .map(Json)
}

async fn delete_user(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
) -> Result<StatusCode, AppError> {
    CONTROLLER
        .call(&rc.trace, "delete_user", |cx| async move { state.users.delete(&cx, id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_user_by_email(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(email): Param<String>,
) -> Result<Json<User>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_user_by_email", |cx| async move {
            state.users.get_by_email(&cx, &email).await
        })
        .await
        .map(Json)
}

async fn list_users_by_role(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(role): Param<String>,
) -> Result<Json<Vec<User>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_users_by_role", |cx| async move {
            state.users.list_by_role(&cx, &role).await
        })
        .await
        .map(Json)
}

async fn count_users_by_role(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(role): Param<String>,
) -> Result<Json<i64>, AppError> {
    CONTROLLER
        .call(&rc.trace, "count_users_by_role", |cx| async move {
            state.users.count_by_role(&cx, &role).await
        })
        .await
        .map(Json)
}

async fn search_users(
    State(state): State<AppState>,
    rc: RequestContext,
    QueryParams(query): QueryParams<SearchQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "search_users", |cx| async move {
            state.users.search(&cx, &query.keyword).await
        })
        .await
        .map(Json)
}

async fn get_user_profile(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
) -> Result<Json<UserProfile>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_user_profile", |cx| async move { state.users.profile(&cx, id).await })
        .await
        .map(Json)
}

async fn create_users_batch(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(reqs): ValidatedJson<Vec<UserRequest>>,
) -> Result<(StatusCode, Json<Vec<User>>), AppError> {
    let users = CONTROLLER
        .call(&rc.trace, "create_users_batch", |cx| async move {
            let users = reqs.into_iter().map(NewUser::from).collect();
            state.users.create_batch(&cx, users).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(users)))
}
