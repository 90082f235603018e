//! Request middleware.
//!
//! Order, outermost first:
//! ```text
//! SetRequestId → PropagateRequestId
//!     → trace_isolation (root span, RequestContext, capture, post-phase)
//!     → error_mapper    (AppError → error body + signals)
//!     → handler
//! ```

pub mod error_mapper;
pub mod trace_isolation;

pub use error_mapper::map_errors;
pub use trace_isolation::isolate_trace;
