//! Lifecycle event parsing and dispatch
//!
//! Inbound payloads arrive either as a JSON object or as a JSON-encoded string
//! that itself decodes to that object. The router validates the application
//! id, normalizes the operation, and dispatches to the orchestrator. A blank
//! id or unrecognized operation is ignored, never dead-lettered; orchestrator
//! errors propagate so the consumer can classify them as failed.

use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{ProvisionError, ProvisionResult};
use crate::orchestrator::ProvisioningOrchestrator;

/// Operation requested by a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create,
    Delete,
    /// Delete using the persisted state record instead of a backend lookup.
    DeleteWithoutLookup,
    FindAll,
    /// Unrecognized operation, preserved verbatim. Never dispatched.
    Unknown(String),
}

impl Operation {
    /// Parse the wire value; blank defaults to `Create`.
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "create" => Operation::Create,
            "delete" => Operation::Delete,
            "delete_2" => Operation::DeleteWithoutLookup,
            "find_all" => Operation::FindAll,
            other => Operation::Unknown(other.to_string()),
        }
    }
}

/// A decoded lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub app_id: String,
    pub operation: Operation,
}

impl LifecycleEvent {
    /// Decode an event from raw payload bytes.
    ///
    /// Accepts a JSON object with `app-id`/`operation` keys, or a JSON string
    /// whose contents decode to that object.
    pub fn decode(payload: &[u8]) -> ProvisionResult<Self> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| ProvisionError::InvalidEvent(e.to_string()))?;

        let object = match value {
            Value::String(inner) => serde_json::from_str::<Value>(&inner)
                .map_err(|e| ProvisionError::InvalidEvent(format!("nested payload: {e}")))?,
            other => other,
        };

        let map = object.as_object().ok_or_else(|| {
            ProvisionError::InvalidEvent("payload is not a JSON object".to_string())
        })?;

        let app_id = map
            .get("app-id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let operation = Operation::parse(
            map.get("operation").and_then(Value::as_str).unwrap_or_default(),
        );

        Ok(Self { app_id, operation })
    }
}

/// Terminal classification of a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A workflow ran to completion.
    Processed,
    /// The message was valid to skip: blank app id or unknown operation.
    Ignored,
}

/// Parses inbound events and runs the matching provisioning workflow.
pub struct MessageRouter {
    orchestrator: ProvisioningOrchestrator,
}

impl MessageRouter {
    pub fn new(orchestrator: ProvisioningOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Route one raw payload to its workflow.
    ///
    /// Returns `Ok(Ignored)` for messages that are skipped by classification;
    /// any decode or workflow error propagates as `Err`.
    pub async fn route(&self, payload: &[u8]) -> ProvisionResult<Outcome> {
        let event = LifecycleEvent::decode(payload)?;

        if event.app_id.trim().is_empty() {
            warn!("Event without app id, ignoring");
            return Ok(Outcome::Ignored);
        }

        match &event.operation {
            Operation::Create => {
                info!(app_id = %event.app_id, "Creating application resources");
                self.orchestrator.create_all(&event.app_id).await?;
            }
            Operation::Delete => {
                info!(app_id = %event.app_id, "Deleting application resources via lookup");
                let state = self.orchestrator.find_all(&event.app_id).await?;
                self.orchestrator.delete_all(&state).await;
            }
            Operation::DeleteWithoutLookup => {
                info!(app_id = %event.app_id, "Deleting application resources from persisted state");
                let state = self.orchestrator.load_state(&event.app_id)?;
                self.orchestrator.delete_all(&state).await;
            }
            Operation::FindAll => {
                self.orchestrator.find_all(&event.app_id).await?;
            }
            Operation::Unknown(op) => {
                warn!(operation = %op, app_id = %event.app_id, "Unknown operation, ignoring");
                return Ok(Outcome::Ignored);
            }
        }

        Ok(Outcome::Processed)
    }
}
