//! Provisioning state and its persistence
//!
//! [`ProvisioningIdentity`] is the immutable, deterministically derived part:
//! the normalized application id and every resource name. [`ProvisioningState`]
//! is the mutable record threaded through a workflow, accumulating remote
//! identifiers step by step. The state is a flat, explicit schema — it is what
//! gets persisted, nothing transient rides along.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{ProvisionError, ProvisionResult};
use crate::naming::{self, ResourceKind};

/// Immutable per-application naming, derived once from the raw identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningIdentity {
    /// Normalized application id
    pub app_id: String,
    pub bucket_name: String,
    pub scraper_name: String,
    pub user_name: String,
    pub var_metrics_name: String,
    pub var_fields_name: String,
    pub dashboard_name: String,
}

impl ProvisioningIdentity {
    /// Derive the identity from a raw application identifier.
    pub fn derive(raw_app_id: &str) -> Self {
        let app_id = naming::normalize(raw_app_id);
        Self {
            bucket_name: naming::name_of(ResourceKind::Bucket, &app_id),
            scraper_name: naming::name_of(ResourceKind::Scraper, &app_id),
            user_name: naming::name_of(ResourceKind::User, &app_id),
            var_metrics_name: naming::name_of(ResourceKind::VarMetricsList, &app_id),
            var_fields_name: naming::name_of(ResourceKind::VarFieldsList, &app_id),
            dashboard_name: naming::dashboard_title(&app_id),
            app_id,
        }
    }
}

/// Flat record of every resource identifier and name for one application.
///
/// The persisted form includes `user_password` so that a lookup-free delete can
/// reconstruct the exact remote state; see the security note in DESIGN.md.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProvisioningState {
    pub app_id: String,
    pub org_id: String,
    pub bucket_id: String,
    pub bucket_name: String,
    pub scraper_id: String,
    pub scraper_name: String,
    pub user_id: String,
    pub user_name: String,
    pub user_password: String,
    pub var_metrics_id: String,
    pub var_metrics_name: String,
    pub var_fields_id: String,
    pub var_fields_name: String,
    pub dashboard_id: String,
    pub dashboard_name: String,
}

impl ProvisioningState {
    /// Start a fresh state from a derived identity. Remote ids are filled in as
    /// the workflow progresses.
    pub fn from_identity(identity: &ProvisioningIdentity) -> Self {
        Self {
            app_id: identity.app_id.clone(),
            bucket_name: identity.bucket_name.clone(),
            scraper_name: identity.scraper_name.clone(),
            user_name: identity.user_name.clone(),
            var_metrics_name: identity.var_metrics_name.clone(),
            var_fields_name: identity.var_fields_name.clone(),
            dashboard_name: identity.dashboard_name.clone(),
            ..Self::default()
        }
    }

    /// Flatten the state into `(field, value)` pairs for template substitution.
    pub fn fields(&self) -> Vec<(String, String)> {
        let value = serde_yaml::to_value(self).unwrap_or_default();
        match value {
            serde_yaml::Value::Mapping(map) => map
                .into_iter()
                .filter_map(|(k, v)| match (k, v) {
                    (serde_yaml::Value::String(k), serde_yaml::Value::String(v)) => Some((k, v)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Application-scoped YAML persistence for [`ProvisioningState`].
///
/// One file per application under the store root, named
/// `state-{normalized_app_id}.yaml`.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Create a store rooted at the given directory. The directory is created
    /// lazily on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the record for a normalized application id.
    pub fn path_for(&self, norm_app_id: &str) -> PathBuf {
        self.root.join(format!("state-{norm_app_id}.yaml"))
    }

    /// Persist the state under its application id.
    pub fn save(&self, state: &ProvisioningState) -> ProvisionResult<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| ProvisionError::StateStore(format!("create {:?}: {e}", self.root)))?;

        let path = self.path_for(&state.app_id);
        let yaml = serde_yaml::to_string(state)?;
        std::fs::write(&path, yaml)
            .map_err(|e| ProvisionError::StateStore(format!("write {path:?}: {e}")))?;

        info!(app_id = %state.app_id, path = %path.display(), "Persisted provisioning state");
        Ok(())
    }

    /// Load the persisted state for a normalized application id.
    ///
    /// A missing record is a distinct [`ProvisionError::StateNotFound`] so the
    /// lookup-free delete path can report it precisely.
    pub fn load(&self, norm_app_id: &str) -> ProvisionResult<ProvisioningState> {
        let path = self.path_for(norm_app_id);
        let yaml = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProvisionError::StateNotFound(norm_app_id.to_string()));
            }
            Err(e) => {
                return Err(ProvisionError::StateStore(format!("read {path:?}: {e}")));
            }
        };

        let state: ProvisioningState = serde_yaml::from_str(&yaml)?;
        debug!(app_id = %norm_app_id, "Loaded provisioning state");
        Ok(state)
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
