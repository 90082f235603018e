//! End-to-end error correlation: every failure path returns a body whose ids
//! point at the request's root span.

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use opentelemetry::trace::{SpanKind, Status};
use serde_json::json;
use serversage::http::ErrorResponse;
use tower::ServiceExt;

mod common;

use common::attribute;

#[tokio::test]
async fn test_rate_limited_order_lookup() {
    let app = common::spawn_app().await;

    let reply = app.get("/api/orders/997").await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);

    let body: ErrorResponse = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body.error, "RATE_LIMIT_EXCEEDED");
    assert_eq!(body.message, "Too many requests. Please try again later.");
    assert_eq!(body.path, "uri=/api/orders/997");
    assert!(!body.trace_id.is_empty());

    let roots = app.root_spans();
    assert_eq!(roots.len(), 1, "exactly one root span per request");
    let root = &roots[0];
    assert_eq!(root.name, "GET /api/orders/{id}");
    assert_eq!(root.span_kind, SpanKind::Server);
    assert_eq!(body.trace_id, root.span_context.trace_id().to_string());
    assert_eq!(body.span_id, root.span_context.span_id().to_string());
    assert_eq!(root.status, Status::error("Too many requests. Please try again later."));
    assert_eq!(attribute(root, "error.type").as_deref(), Some("RATE_LIMIT_EXCEEDED"));
    assert_eq!(attribute(root, "http.status_code").as_deref(), Some("429"));
    assert_eq!(attribute(root, "error").as_deref(), Some("true"));
}

#[tokio::test]
async fn test_database_failure_on_product_create() {
    let app = common::spawn_app().await;

    let reply = app
        .request(
            Method::POST,
            "/api/products",
            Some(json!({ "name": "dberror widget", "price": 10.0, "stockQuantity": 1 })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = reply.json();
    assert_eq!(body["error"], "DATABASE_ERROR");
    assert_eq!(body["message"], "Database connection failed while creating product");
}

#[tokio::test]
async fn test_price_cap_on_product_update() {
    let app = common::spawn_app().await;

    let reply = app
        .request(
            Method::PUT,
            "/api/products/5",
            Some(json!({ "name": "Headphones", "price": 10500.0, "stockQuantity": 10 })),
        )
        .await;

    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = reply.json();
    assert_eq!(body["error"], "BUSINESS_LOGIC_ERROR");
    assert_eq!(body["message"], "Product price cannot exceed $10,000");
}

#[tokio::test]
async fn test_concurrent_requests_never_share_a_trace() {
    let addr: SocketAddr = "127.0.0.1:28381".parse().unwrap();
    let (shutdown, exporter) = common::start_server(addr).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let orders = client.get(format!("http://{}/api/orders/997", addr)).send();
    let users = client.get(format!("http://{}/api/users/999", addr)).send();
    let (orders, users) = tokio::join!(orders, users);

    let orders: ErrorResponse = orders.unwrap().json().await.unwrap();
    let users: ErrorResponse = users.unwrap().json().await.unwrap();
    assert_eq!(orders.error, "RATE_LIMIT_EXCEEDED");
    assert_eq!(users.error, "ARRAY_INDEX_OUT_OF_BOUNDS");
    assert_ne!(orders.trace_id, users.trace_id);

    let roots: Vec<_> = exporter
        .get_finished_spans()
        .unwrap()
        .into_iter()
        .filter(|span| span.parent_span_id == opentelemetry::trace::SpanId::INVALID)
        .collect();
    assert_eq!(roots.len(), 2);
    let traces: HashSet<_> = roots.iter().map(|span| span.span_context.trace_id()).collect();
    assert_eq!(traces.len(), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_successful_request_builds_one_trace() {
    let app = common::spawn_app().await;

    let reply = app.get("/api/users/1").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["email"], "alice@example.com");
    assert!(reply.headers.contains_key("x-request-id"));

    let spans = app.spans();
    let roots = app.root_spans();
    assert_eq!(roots.len(), 1);
    let root = &roots[0];
    assert_eq!(root.status, Status::Ok);
    assert_eq!(attribute(root, "http.route").as_deref(), Some("/api/users/{id}"));
    assert_eq!(attribute(root, "error").as_deref(), Some("false"));
    assert!(attribute(root, "http.response.body").unwrap().contains("alice@example.com"));

    let names: HashSet<_> = spans.iter().map(|span| span.name.to_string()).collect();
    for expected in [
        "UserController.get_user_by_id",
        "UserService.get",
        "UserRepository.find_by_id",
        "db.query",
    ] {
        assert!(names.contains(expected), "missing span {}", expected);
    }

    let trace_id = root.span_context.trace_id();
    assert!(spans.iter().all(|span| span.span_context.trace_id() == trace_id));
}

#[tokio::test]
async fn test_client_request_id_is_kept() {
    let app = common::spawn_app().await;

    let request = Request::builder()
        .uri("/api/products/1")
        .header("x-request-id", "req-from-client")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-from-client");

    let roots = app.root_spans();
    assert_eq!(attribute(&roots[0], "http.request_id").as_deref(), Some("req-from-client"));
}

#[tokio::test]
async fn test_unknown_route_is_mapped() {
    let app = common::spawn_app().await;

    let reply = app.get("/api/nowhere").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let body: ErrorResponse = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body.error, "ROUTE_NOT_FOUND");

    let roots = app.root_spans();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].name, "GET unmatched");
    assert_eq!(attribute(&roots[0], "http.route").as_deref(), Some("unmatched"));
    assert_eq!(body.trace_id, roots[0].span_context.trace_id().to_string());
}

#[tokio::test]
async fn test_missing_fields_return_field_map() {
    let app = common::spawn_app().await;

    let reply = app
        .request(Method::POST, "/api/users", Some(json!({ "role": "USER" })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let body: ErrorResponse = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body.error, "VALIDATION_FAILED");
    let fields = body.validation_errors.unwrap();
    assert_eq!(fields.get("name").map(String::as_str), Some("Name is required"));
    assert_eq!(fields.get("email").map(String::as_str), Some("Email is required"));

    let roots = app.root_spans();
    assert!(attribute(&roots[0], "http.request.body").unwrap().contains("USER"));
}

#[tokio::test]
async fn test_non_numeric_id_is_illegal_argument() {
    let app = common::spawn_app().await;

    let reply = app.get("/api/orders/abc").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], "ILLEGAL_ARGUMENT");
}

#[tokio::test]
async fn test_background_create_joins_request_trace() {
    let app = common::spawn_app().await;

    let reply = app
        .request(
            Method::POST,
            "/api/users/async",
            Some(json!({ "name": "Frank", "email": "frank@example.com" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["role"], "USER");

    let spans = app.spans();
    let roots = app.root_spans();
    assert_eq!(roots.len(), 1);
    let create = spans
        .iter()
        .find(|span| span.name == "UserService.create")
        .expect("background create span");
    assert_eq!(create.span_context.trace_id(), roots[0].span_context.trace_id());
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let app = common::spawn_app().await;

    let placed = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "userId": 2, "productId": 6, "quantity": 4 })),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    let order_id = placed.json()["id"].as_i64().unwrap();
    assert_eq!(app.get("/api/products/6").await.json()["stockQuantity"], 56);

    let cancelled = app
        .request(Method::DELETE, &format!("/api/orders/{}", order_id), None)
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.text(), "Order cancelled successfully");
    assert_eq!(app.get("/api/products/6").await.json()["stockQuantity"], 60);

    let again = app
        .request(Method::DELETE, &format!("/api/orders/{}", order_id), None)
        .await;
    assert_eq!(again.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(again.json()["message"], "Order is already cancelled");
}

#[tokio::test]
async fn test_alert_history_and_summary() {
    let app = common::spawn_app().await;

    let reply = app
        .request(
            Method::POST,
            "/api/alerts/critical",
            Some(json!({ "title": "Disk", "message": "disk full" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "Critical alert received successfully");

    let history = app.get("/api/alerts/history/critical").await.json();
    assert_eq!(history[0]["message"], "disk full");
    assert_eq!(app.get("/api/alerts/history/unknown").await.json(), json!([]));
    assert_eq!(app.get("/api/alerts/status").await.json()["criticalAlerts"], 1);

    app.get("/api/orders/997").await;
    let summary = app.get("/api/analytics/errors/summary").await.json();
    assert_eq!(summary["errorsByCode"]["RATE_LIMIT_EXCEEDED"], 1);
}

#[tokio::test]
async fn test_health_pings_database() {
    let app = common::spawn_app().await;

    let reply = app.get("/health").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({ "status": "UP", "database": "UP" }));
}

#[tokio::test]
async fn test_wrong_method_is_mapped() {
    let app = common::spawn_app().await;

    let reply = app.request(Method::PATCH, "/api/users", None).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);

    let body: ErrorResponse = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body.error, "METHOD_NOT_ALLOWED");
    assert_eq!(body.path, "uri=/api/users");

    let roots = app.root_spans();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].name, "PATCH /api/users");
    assert_eq!(body.trace_id, roots[0].span_context.trace_id().to_string());
    assert_eq!(attribute(&roots[0], "error.type").as_deref(), Some("METHOD_NOT_ALLOWED"));

    let summary = app.get("/api/analytics/errors/summary").await.json();
    assert_eq!(summary["errorsByCode"]["METHOD_NOT_ALLOWED"], 1);
}

#[tokio::test]
async fn test_ids_share_one_route_label() {
    let app = common::spawn_app().await;

    app.get("/api/orders/42").await;
    app.get("/api/orders/997").await;

    let names: Vec<_> = app.root_spans().iter().map(|span| span.name.to_string()).collect();
    assert_eq!(names, ["GET /api/orders/{id}", "GET /api/orders/{id}"]);
}

#[tokio::test]
async fn test_concurrent_orders_both_take_stock() {
    let app = common::spawn_app().await;
    let order = json!({ "userId": 2, "productId": 6, "quantity": 4 });

    let (first, second) = tokio::join!(
        app.request(Method::POST, "/api/orders", Some(order.clone())),
        app.request(Method::POST, "/api/orders", Some(order.clone())),
    );
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(second.status, StatusCode::CREATED);

    assert_eq!(app.get("/api/products/6").await.json()["stockQuantity"], 52);
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let app = common::spawn_app().await;
    // The cookbook starts with 5 in stock.
    let order = json!({ "userId": 3, "productId": 7, "quantity": 3 });

    let (first, second) = tokio::join!(
        app.request(Method::POST, "/api/orders", Some(order.clone())),
        app.request(Method::POST, "/api/orders", Some(order.clone())),
    );
    let mut statuses = [first.status, second.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    let rejected = if first.status == StatusCode::BAD_REQUEST { first } else { second };
    assert_eq!(rejected.json()["error"], "INSUFFICIENT_STOCK");
    assert_eq!(app.get("/api/products/7").await.json()["stockQuantity"], 2);

    let orders = app.get("/api/orders/user/3").await.json();
    let cookbook_orders = orders
        .as_array()
        .unwrap()
        .iter()
        .filter(|order| order["productId"] == 7)
        .count();
    assert_eq!(cookbook_orders, 1);
}

#[tokio::test]
async fn test_stock_adjustment_overflow_is_rejected() {
    let app = common::spawn_app().await;

    let reply = app
        .request(
            Method::PATCH,
            &format!("/api/products/1/stock?quantity={}", i64::MAX),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], "VALIDATION_ERROR");

    assert_eq!(app.get("/api/products/1").await.json()["stockQuantity"], 50);
}

#[tokio::test]
async fn test_stock_adjustment_cannot_go_negative() {
    let app = common::spawn_app().await;

    let added = app.request(Method::PATCH, "/api/products/7/stock?quantity=10", None).await;
    assert_eq!(added.status, StatusCode::OK);
    assert_eq!(added.json()["stockQuantity"], 15);

    let drained = app.request(Method::PATCH, "/api/products/7/stock?quantity=-16", None).await;
    assert_eq!(drained.status, StatusCode::BAD_REQUEST);
    assert_eq!(drained.json()["error"], "INSUFFICIENT_STOCK");
    assert_eq!(app.get("/api/products/7").await.json()["stockQuantity"], 15);
}
