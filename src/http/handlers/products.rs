use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::AppError;
use crate::http::extract::{Param, QueryParams, ValidatedJson};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::models::{NewProduct, Product, ProductRequest};
use crate::observability::Component;

const CONTROLLER: Component = Component::controller("ProductController");

const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    keyword: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceRangeQuery {
    min_price: f64,
    max_price: f64,
}

#[derive(Debug, Deserialize)]
struct ThresholdQuery {
    threshold: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StockQuery {
    quantity: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/async", post(create_product_async))
        .route("/search", get(search_products))
        .route("/price-range", get(list_products_by_price_range))
        .route("/low-stock", get(list_low_stock_products))
        .route("/category/{category}", get(list_products_by_category))
        .route("/category/{category}/count", get(count_products_by_category))
        .route("/{id}", get(get_product).put(update_product).delete(delete_product))
        .route("/{id}/stock", patch(update_stock))
        .route("/{id}/recommendations", get(get_recommendations))
}

async fn list_products(State(state): State<AppState>, rc: RequestContext) -> Result<Json<Vec<Product>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_all_products", |cx| async move { state.products.list(&cx).await })
        .await
        .map(Json)
}

async fn get_product(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
) -> Result<Json<Product>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_product_by_id", |cx| async move { state.products.get(&cx, id).await })
        .await
        .map(Json)
}

async fn create_product(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = CONTROLLER
        .call(&rc.trace, "create_product", |cx| async move {
            state.products.create(&cx, NewProduct::from(req)).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn create_product_async(
    State(state): State<AppState>,
    rc: RequestContext,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = CONTROLLER
        .call(&rc.trace, "create_product_async", |cx| async move {
            state.products.create_in_background(&cx, NewProduct::from(req)).await
        })
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
    ValidatedJson(req): ValidatedJson<ProductRequest>,
) -> Result<Json<Product>, AppError> {
    CONTROLLER
        .call(&rc.trace, "update_product", |cx| async move {
            state.products.update(&cx, id, NewProduct::from(req)).await
        })
        .await
        .map(Json)
}

async fn delete_product(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
) -> Result<StatusCode, AppError> {
    CONTROLLER
        .call(&rc.trace, "delete_product", |cx| async move { state.products.delete(&cx, id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_products_by_category(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(category): Param<String>,
) -> Result<Json<Vec<Product>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_products_by_category", |cx| async move {
            state.products.list_by_category(&cx, &category).await
        })
        .await
        .map(Json)
}

async fn count_products_by_category(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(category): Param<String>,
) -> Result<Json<i64>, AppError> {
    CONTROLLER
        .call(&rc.trace, "count_products_by_category", |cx| async move {
            state.products.count_by_category(&cx, &category).await
        })
        .await
        .map(Json)
}

async fn search_products(
    State(state): State<AppState>,
    rc: RequestContext,
    QueryParams(query): QueryParams<SearchQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "search_products", |cx| async move {
            state.products.search(&cx, &query.keyword).await
        })
        .await
        .map(Json)
}

async fn list_products_by_price_range(
    State(state): State<AppState>,
    rc: RequestContext,
    QueryParams(query): QueryParams<PriceRangeQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_products_by_price_range", |cx| async move {
            state
                .products
                .list_by_price_range(&cx, query.min_price, query.max_price)
                .await
        })
        .await
        .map(Json)
}

async fn list_low_stock_products(
    State(state): State<AppState>,
    rc: RequestContext,
    QueryParams(query): QueryParams<ThresholdQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    CONTROLLER
        .call(&rc.trace, "get_low_stock_products", |cx| async move {
            state.products.list_low_stock(&cx, threshold).await
        })
        .await
        .map(Json)
}

async fn update_stock(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
    QueryParams(query): QueryParams<StockQuery>,
) -> Result<Json<Product>, AppError> {
    CONTROLLER
        .call(&rc.trace, "update_stock", |cx| async move {
            state.products.adjust_stock(&cx, id, query.quantity).await
        })
        .await
        .map(Json)
}

async fn get_recommendations(
    State(state): State<AppState>,
    rc: RequestContext,
    Param(id): Param<i64>,
) -> Result<String, AppError> {
    CONTROLLER
        .call(&rc.trace, "get_recommendations", |cx| async move {
            state.products.recommendations(&cx, id).await
        })
        .await
}
