//! Business logic behind the REST surface.
//!
//! # Data Flow
//! ```text
//! handler (controller span)
//!     → <Entity>Service.<method> span (business rules, fault fixtures)
//!     → repository span → db.<operation> client span
//! ```
//!
//! # Design Decisions
//! - Services are cheap to clone; repositories share one pool
//! - Simulated latency and failure rates come from `SimulationConfig` so
//!   tests can switch them off
//! - Background work receives the caller's `TraceContext` by value

pub mod alerts;
pub mod analytics;
pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use crate::config::SimulationConfig;

pub use alerts::AlertService;
pub use analytics::AnalyticsService;
pub use orders::OrderService;
pub use products::ProductService;
pub use users::UserService;

/// Artificial latency and failure injection.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Sleep for a uniform duration in the regular delay range.
    pub async fn delay(&self) {
        self.sleep_between(self.config.delay_min_ms, self.config.delay_max_ms).await;
    }

    /// Sleep for a uniform duration in the slow delay range.
    pub async fn slow_delay(&self) {
        self.sleep_between(self.config.slow_delay_min_ms, self.config.slow_delay_max_ms)
            .await;
    }

    /// Sleep past the nominal deadline of a timed-out call.
    pub async fn timeout_delay(&self) {
        if self.config.timeout_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.timeout_delay_ms)).await;
        }
    }

    /// Returns true with probability `rate`.
    pub fn fails(&self, rate: f64) -> bool {
        rate > 0.0 && fastrand::f64() < rate
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    async fn sleep_between(&self, min_ms: u64, max_ms: u64) {
        if !self.config.delays_enabled || max_ms == 0 {
            return;
        }
        let ms = fastrand::u64(min_ms..=max_ms.max(min_ms));
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_simulator_never_fails() {
        let simulator = Simulator::new(SimulationConfig::disabled());
        assert!((0..1000).all(|_| !simulator.fails(simulator.config().payment_failure_rate)));
    }

    #[test]
    fn test_certain_failure() {
        let simulator = Simulator::new(SimulationConfig::default());
        assert!(simulator.fails(1.0));
    }

    #[tokio::test]
    async fn test_disabled_delays_return_immediately() {
        let simulator = Simulator::new(SimulationConfig::disabled());
        let started = std::time::Instant::now();
        simulator.delay().await;
        simulator.slow_delay().await;
        simulator.timeout_delay().await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
