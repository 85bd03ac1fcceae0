//! Counter capabilities for the ingestion pipeline
//!
//! Counters are injected collaborators rather than process-wide singletons, so
//! tests can observe classification directly. The production implementation
//! emits through the `metrics` facade; installing an exporter is the host
//! process's concern.

use std::sync::Arc;

/// Connection health as observed by the ingestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionHealth {
    Up,
    Down,
}

/// Callback invoked on every connection health transition.
pub type HealthCallback = Arc<dyn Fn(ConnectionHealth) + Send + Sync>;

/// Counters updated by the consumer loop and the ingestor.
pub trait Counters: Send + Sync {
    /// Connection status gauge: up = 1, down = 0.
    fn connection(&self, health: ConnectionHealth);
    /// A message was processed to completion.
    fn processed(&self);
    /// A message was skipped by classification.
    fn ignored(&self);
    /// A message failed and was dead-lettered.
    fn failed(&self);
}

/// `metrics`-facade implementation.
#[derive(Debug, Clone, Default)]
pub struct MetricsCounters;

impl Counters for MetricsCounters {
    fn connection(&self, health: ConnectionHealth) {
        let value = match health {
            ConnectionHealth::Up => 1.0,
            ConnectionHealth::Down => 0.0,
        };
        metrics::gauge!("bus_connection_status").set(value);
    }

    fn processed(&self) {
        metrics::counter!("messages_processed_total").increment(1);
    }

    fn ignored(&self) {
        metrics::counter!("messages_ignored_total").increment(1);
    }

    fn failed(&self) {
        metrics::counter!("messages_failed_total").increment(1);
    }
}
