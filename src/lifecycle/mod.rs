//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Logging → Telemetry → Metrics → Database → Gauges → Listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain (bounded) → Flush spans → Close pool
//! ```
//!
//! # Design Decisions
//! - Ordered startup: logging first so every later step can report
//! - Fail fast: any startup error is fatal
//! - Draining has a deadline; spans are flushed even when it expires

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
