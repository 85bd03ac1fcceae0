//! Error types for provisioning operations

use thiserror::Error;

/// Errors that can occur while ingesting events or provisioning resources
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Bus connection error
    #[error("bus connection error: {0}")]
    BusConnection(String),

    /// Bus publish error
    #[error("bus publish error: {0}")]
    BusPublish(String),

    /// Bus subscribe error
    #[error("bus subscribe error: {0}")]
    BusSubscribe(String),

    /// Inbound payload could not be decoded into a lifecycle event
    #[error("invalid event payload: {0}")]
    InvalidEvent(String),

    /// The configured organization does not exist on the backend
    #[error("organization '{0}' not found")]
    OrgNotFound(String),

    /// The resource API rejected or failed a call
    #[error("resource API error ({operation}): {message}")]
    ResourceApi {
        /// The remote operation that failed, e.g. "create bucket"
        operation: String,
        /// Status line and body text from the backend
        message: String,
    },

    /// A lookup over the backend listing found no matching resource
    #[error("no {kind} matching '{name}' found")]
    ResourceNotFound {
        /// Resource kind that was searched
        kind: String,
        /// Deterministic name that was searched for
        name: String,
    },

    /// No persisted state record exists for the application
    #[error("no persisted state for app '{0}'")]
    StateNotFound(String),

    /// State record could not be read or written
    #[error("state store error: {0}")]
    StateStore(String),

    /// Template file could not be loaded or parsed
    #[error("template error: {0}")]
    Template(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ProvisionError {
    fn from(err: serde_yaml::Error) -> Self {
        ProvisionError::Serialization(err.to_string())
    }
}
