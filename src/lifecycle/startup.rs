//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Seed the entity gauges from the database
//! - Bind the listener and serve until a shutdown signal
//! - Tear down: bounded drain, span flush, pool close
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use opentelemetry::trace::SpanKind;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServerSageConfig;
use crate::db::Database;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::logging::init_logging;
use crate::observability::metrics::{self, Entity};
use crate::observability::{Telemetry, TelemetryError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("invalid {field} '{value}': {source}")]
    Address {
        field: &'static str,
        value: String,
        source: AddrParseError,
    },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Server(#[from] tokio::task::JoinError),
}

/// Start every subsystem and serve until shutdown.
pub async fn run(config: ServerSageConfig) -> Result<(), StartupError> {
    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "serversage starting");

    let telemetry = Telemetry::init(&config.telemetry)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|source| StartupError::Address {
                field: "observability.metrics_address",
                value: config.observability.metrics_address.clone(),
                source,
            })?;
        metrics::init_metrics(addr)?;
    }

    let db = Database::connect(&config.database).await?;
    let state = AppState::new(&config, telemetry.clone(), db.clone());
    seed_entity_gauges(&state).await;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());
    let mut stopping = shutdown.subscribe();

    let mut server = tokio::spawn(HttpServer::from_state(state).run(listener, shutdown.subscribe()));

    let finished = tokio::select! {
        result = &mut server => Some(result),
        _ = stopping.recv() => None,
    };

    let result = match finished {
        Some(result) => result,
        None => {
            let drain = Duration::from_secs(config.shutdown.drain_timeout_secs);
            match tokio::time::timeout(drain, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(drain_timeout_secs = drain.as_secs(), "Drain deadline reached, aborting");
                    server.abort();
                    Ok(Ok(()))
                }
            }
        }
    };

    telemetry.shutdown();
    db.close().await;
    tracing::info!("Shutdown complete");

    result??;
    Ok(())
}

/// Read the entity counts once so the gauges start at the real values.
async fn seed_entity_gauges(state: &AppState) {
    let root = state
        .telemetry
        .start_root("application.startup", SpanKind::Internal, Vec::new());

    match state.analytics.dashboard(root.context()).await {
        Ok(dashboard) => {
            metrics::set_entity_count(Entity::Users, dashboard.total_users);
            metrics::set_entity_count(Entity::Products, dashboard.total_products);
            metrics::set_entity_count(Entity::Orders, dashboard.total_orders);
            tracing::info!(
                users = dashboard.total_users,
                products = dashboard.total_products,
                orders = dashboard.total_orders,
                "Entity gauges initialized"
            );
        }
        Err(err) => tracing::warn!(error = %err, "Could not read entity counts"),
    }

    root.end();
}
