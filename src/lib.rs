//! ServerSage: request tracing and error correlation for a CRUD backend.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ middleware (root span, error mapping)
//!                                          │
//!                                          ▼
//!                                    http::handlers   (controller spans)
//!                                          │
//!                                          ▼
//!                                      services       (service spans, rules)
//!                                          │
//!                                          ▼
//!                                     repository      (repository spans)
//!                                          │
//!                                          ▼
//!                                     db::tracer      (db.* client spans) ──▶ SQLite
//!
//!     Cross-cutting: config, observability (spans, metrics, logs, error
//!     ledger), lifecycle (startup, signals, shutdown)
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod repository;
pub mod services;

pub use config::ServerSageConfig;
pub use error::AppError;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
