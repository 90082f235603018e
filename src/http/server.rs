//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the services the handlers share (`AppState`)
//! - Create the Axum router with every resource router nested under `/api`
//! - Wire up middleware (request id, trace isolation, error mapping)
//! - Serve on a listener until the shutdown signal fires
//!
//! # Design Decisions
//! - Layers are applied with `Router::layer`, so unmatched paths (the
//!   fallback) get a root span and a mapped 404 like any other request
//! - The router can be taken without a listener for in-process tests

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::OriginalUri;
use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::{CaptureConfig, ServerSageConfig};
use crate::db::Database;
use crate::error::AppError;
use crate::http::handlers;
use crate::http::middleware::{isolate_trace, map_errors};
use crate::http::request::MakeRequestUuid;
use crate::observability::{ErrorLedger, Telemetry};
use crate::repository::{OrderRepository, ProductRepository, UserRepository};
use crate::services::{AlertService, AnalyticsService, OrderService, ProductService, Simulator, UserService};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub products: ProductService,
    pub orders: OrderService,
    pub analytics: AnalyticsService,
    pub alerts: AlertService,
    pub ledger: Arc<ErrorLedger>,
    pub telemetry: Telemetry,
    pub db: Database,
    pub capture: CaptureConfig,
    pub service_name: Arc<str>,
}

impl AppState {
    pub fn new(config: &ServerSageConfig, telemetry: Telemetry, db: Database) -> Self {
        let simulator = Simulator::new(config.simulation.clone());
        let ledger = Arc::new(ErrorLedger::new());

        let users = UserRepository::new(db.clone());
        let products = ProductRepository::new(db.clone());
        let orders = OrderRepository::new(db.clone());

        Self {
            users: UserService::new(users.clone(), simulator.clone()),
            products: ProductService::new(products.clone(), simulator.clone()),
            orders: OrderService::new(orders, users, products, simulator.clone()),
            analytics: AnalyticsService::new(db.clone(), ledger.clone(), simulator),
            alerts: AlertService::new(config.alerts.history_limit),
            ledger,
            telemetry,
            db,
            capture: config.capture.clone(),
            service_name: Arc::from(config.telemetry.service_name.as_str()),
        }
    }
}

/// HTTP server for the ServerSage API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ServerSageConfig, telemetry: Telemetry, db: Database) -> Self {
        Self::from_state(AppState::new(config, telemetry, db))
    }

    /// Serve an already built state.
    pub fn from_state(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .nest("/api/users", handlers::users::router())
            .nest("/api/products", handlers::products::router())
            .nest("/api/orders", handlers::orders::router())
            .nest("/api/analytics", handlers::analytics::router())
            .nest("/api/alerts", handlers::alerts::router())
            .merge(handlers::health::router())
            .method_not_allowed_fallback(method_not_allowed)
            .fallback(route_not_found)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(middleware::from_fn_with_state(state.clone(), isolate_trace))
                    .layer(middleware::from_fn_with_state(state.clone(), map_errors)),
            )
            .with_state(state)
    }

    /// The fully layered router, for serving in-process.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn route_not_found(uri: axum::http::Uri) -> AppError {
    AppError::RouteNotFound(uri.path().to_string())
}

async fn method_not_allowed(method: axum::http::Method, OriginalUri(uri): OriginalUri) -> AppError {
    AppError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}
