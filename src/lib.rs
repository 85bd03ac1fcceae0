//! Event-driven provisioning of per-application observability resources
//!
//! Reacts to application lifecycle events delivered over a message bus and
//! provisions or tears down the dependent resource set (bucket, scraper, user,
//! dashboard variables, dashboard, access grant) for each application.
//!
//! Two halves: the ingestion pipeline ([`ingest`], [`consumer`]) keeps the
//! network loop non-blocking and routes failures to a dead-letter topic; the
//! provisioning side ([`orchestrator`], [`client`], [`state`]) runs the
//! ordered, partially idempotent workflows against the resource backend.

pub mod client;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod ingest;
pub mod metrics;
pub mod naming;
pub mod orchestrator;
pub mod router;
pub mod state;
pub mod templates;

// Re-export commonly used types
pub use client::{HttpResourceClient, ResourceClient, ResourceClientConfig};
pub use consumer::{BusDeadLetterSink, ConsumerHandle, ConsumerLoop, DeadLetterRecord, QueueItem};
pub use errors::{ProvisionError, ProvisionResult};
pub use ingest::{BackoffPolicy, BusConfig, MessageIngestor};
pub use metrics::{ConnectionHealth, Counters, MetricsCounters};
pub use orchestrator::{ProvisioningOrchestrator, TeardownReport};
pub use router::{LifecycleEvent, MessageRouter, Operation, Outcome};
pub use state::{ProvisioningIdentity, ProvisioningState, StateStore};
pub use templates::TemplateSet;
