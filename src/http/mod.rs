//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request id, route label, RequestContext)
//!     → middleware/ (root span per request, error mapping)
//!     → extract.rs (typed path/query/body, rejections as AppError)
//!     → handlers/ (controller spans, call into services)
//!     → response.rs (error body, span + metric + ledger + log)
//!     → Send to client
//! ```

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use response::ErrorResponse;
pub use server::{AppState, HttpServer};
