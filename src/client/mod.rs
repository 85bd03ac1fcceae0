//! Resource backend boundary
//!
//! [`ResourceClient`] is the capability trait covering every remote operation
//! the provisioning workflows need. The production implementation talks to the
//! backend's REST API over HTTP; tests substitute a recording mock.

mod http;

pub use http::{HttpResourceClient, ResourceClientConfig};

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ProvisionResult;

/// One item from a backend listing endpoint, in listing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub id: String,
    pub name: String,
}

/// A cell of a freshly created dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardCell {
    pub id: String,
    pub name: String,
}

/// Result of creating a dashboard: its id plus the cells the backend laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardCreated {
    pub id: String,
    pub cells: Vec<DashboardCell>,
}

/// CRUD operations against the observability backend.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Resolve an organization id by exact name.
    async fn find_org(&self, name: &str) -> ProvisionResult<String>;

    async fn create_bucket(
        &self,
        org_id: &str,
        name: &str,
        retention_secs: u64,
    ) -> ProvisionResult<String>;
    async fn delete_bucket(&self, bucket_id: &str) -> ProvisionResult<()>;
    async fn list_buckets(&self, org_id: &str) -> ProvisionResult<Vec<ResourceEntry>>;

    async fn create_scraper(
        &self,
        org_id: &str,
        bucket_id: &str,
        name: &str,
        target_url: &str,
    ) -> ProvisionResult<String>;
    async fn delete_scraper(&self, scraper_id: &str) -> ProvisionResult<()>;
    async fn list_scrapers(&self) -> ProvisionResult<Vec<ResourceEntry>>;

    async fn create_user(
        &self,
        org_id: &str,
        name: &str,
        password: &str,
    ) -> ProvisionResult<String>;
    /// Apply a password to an existing user. The backend does not reliably set
    /// it at creation time, so creation is always followed by this call.
    async fn set_user_password(&self, user_id: &str, password: &str) -> ProvisionResult<()>;
    async fn delete_user(&self, user_id: &str) -> ProvisionResult<()>;
    async fn list_users(&self) -> ProvisionResult<Vec<ResourceEntry>>;

    async fn create_variable(
        &self,
        org_id: &str,
        name: &str,
        flux_query: &str,
    ) -> ProvisionResult<String>;
    async fn delete_variable(&self, variable_id: &str) -> ProvisionResult<()>;
    async fn list_variables(&self) -> ProvisionResult<Vec<ResourceEntry>>;

    /// Create a dashboard from a rendered template payload.
    async fn create_dashboard(&self, payload: &Value) -> ProvisionResult<DashboardCreated>;
    /// Patch the view of one dashboard cell with a rendered chart payload.
    async fn patch_cell_view(
        &self,
        dashboard_id: &str,
        cell_id: &str,
        payload: &Value,
    ) -> ProvisionResult<()>;
    async fn delete_dashboard(&self, dashboard_id: &str) -> ProvisionResult<()>;
    async fn list_dashboards(&self) -> ProvisionResult<Vec<ResourceEntry>>;

    /// Grant the user read+write on the bucket and dashboard. Returns the
    /// grant id.
    async fn grant_access(
        &self,
        org_id: &str,
        user_id: &str,
        user_name: &str,
        bucket_id: &str,
        dashboard_id: &str,
    ) -> ProvisionResult<String>;
    /// List ids of all access grants owned by a user.
    async fn list_user_grants(&self, user_id: &str) -> ProvisionResult<Vec<String>>;
    async fn revoke_grant(&self, grant_id: &str) -> ProvisionResult<()>;
}
