//! Shared test doubles: a recording resource backend, counters, and a
//! dead-letter sink that captures records instead of publishing them.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use neb_provisioner::client::{DashboardCell, DashboardCreated, ResourceClient, ResourceEntry};
use neb_provisioner::consumer::{DeadLetterRecord, DeadLetterSink};
use neb_provisioner::errors::{ProvisionError, ProvisionResult};
use neb_provisioner::metrics::{ConnectionHealth, Counters};

/// In-memory resource backend that records every call and can be told to fail
/// specific operations.
#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    next_id: AtomicUsize,

    pub buckets: Mutex<Vec<ResourceEntry>>,
    pub scrapers: Mutex<Vec<ResourceEntry>>,
    pub users: Mutex<Vec<ResourceEntry>>,
    pub variables: Mutex<Vec<ResourceEntry>>,
    pub dashboards: Mutex<Vec<ResourceEntry>>,
    /// (grant id, user id)
    pub grants: Mutex<Vec<(String, String)>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the named operation fail from now on.
    pub fn fail_on(&self, operation: &str) {
        self.failing.lock().unwrap().insert(operation.to_string());
    }

    /// Make every teardown-side operation fail.
    pub fn fail_all_deletes(&self) {
        for op in [
            "list_user_grants",
            "revoke_grant",
            "delete_dashboard",
            "delete_variable",
            "delete_user",
            "delete_scraper",
            "delete_bucket",
        ] {
            self.fail_on(op);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn record(&self, operation: &str, detail: &str) -> ProvisionResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{operation}:{detail}"));
        if self.failing.lock().unwrap().contains(operation) {
            return Err(ProvisionError::ResourceApi {
                operation: operation.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}")
    }
}

#[async_trait]
impl ResourceClient for MockBackend {
    async fn find_org(&self, name: &str) -> ProvisionResult<String> {
        self.record("find_org", name)?;
        if name == "missing-org" {
            return Err(ProvisionError::OrgNotFound(name.to_string()));
        }
        Ok("org-1".to_string())
    }

    async fn create_bucket(
        &self,
        _org_id: &str,
        name: &str,
        _retention_secs: u64,
    ) -> ProvisionResult<String> {
        self.record("create_bucket", name)?;
        let id = self.fresh_id("bucket");
        self.buckets.lock().unwrap().push(ResourceEntry {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn delete_bucket(&self, bucket_id: &str) -> ProvisionResult<()> {
        self.record("delete_bucket", bucket_id)
    }

    async fn list_buckets(&self, _org_id: &str) -> ProvisionResult<Vec<ResourceEntry>> {
        self.record("list_buckets", "")?;
        Ok(self.buckets.lock().unwrap().clone())
    }

    async fn create_scraper(
        &self,
        _org_id: &str,
        _bucket_id: &str,
        name: &str,
        _target_url: &str,
    ) -> ProvisionResult<String> {
        self.record("create_scraper", name)?;
        let id = self.fresh_id("scraper");
        self.scrapers.lock().unwrap().push(ResourceEntry {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn delete_scraper(&self, scraper_id: &str) -> ProvisionResult<()> {
        self.record("delete_scraper", scraper_id)
    }

    async fn list_scrapers(&self) -> ProvisionResult<Vec<ResourceEntry>> {
        self.record("list_scrapers", "")?;
        Ok(self.scrapers.lock().unwrap().clone())
    }

    async fn create_user(
        &self,
        _org_id: &str,
        name: &str,
        _password: &str,
    ) -> ProvisionResult<String> {
        self.record("create_user", name)?;
        let id = self.fresh_id("user");
        self.users.lock().unwrap().push(ResourceEntry {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn set_user_password(&self, user_id: &str, _password: &str) -> ProvisionResult<()> {
        self.record("set_user_password", user_id)
    }

    async fn delete_user(&self, user_id: &str) -> ProvisionResult<()> {
        self.record("delete_user", user_id)
    }

    async fn list_users(&self) -> ProvisionResult<Vec<ResourceEntry>> {
        self.record("list_users", "")?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn create_variable(
        &self,
        _org_id: &str,
        name: &str,
        _flux_query: &str,
    ) -> ProvisionResult<String> {
        self.record("create_variable", name)?;
        let id = self.fresh_id("var");
        self.variables.lock().unwrap().push(ResourceEntry {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn delete_variable(&self, variable_id: &str) -> ProvisionResult<()> {
        self.record("delete_variable", variable_id)
    }

    async fn list_variables(&self) -> ProvisionResult<Vec<ResourceEntry>> {
        self.record("list_variables", "")?;
        Ok(self.variables.lock().unwrap().clone())
    }

    async fn create_dashboard(&self, payload: &Value) -> ProvisionResult<DashboardCreated> {
        let name = payload["name"].as_str().unwrap_or_default().to_string();
        self.record("create_dashboard", &name)?;
        let id = self.fresh_id("dash");
        self.dashboards.lock().unwrap().push(ResourceEntry {
            id: id.clone(),
            name: name.clone(),
        });

        let cells = payload["cells"]
            .as_array()
            .map(|cells| {
                cells
                    .iter()
                    .map(|c| DashboardCell {
                        id: self.fresh_id("cell"),
                        name: c["name"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(DashboardCreated { id, cells })
    }

    async fn patch_cell_view(
        &self,
        dashboard_id: &str,
        cell_id: &str,
        _payload: &Value,
    ) -> ProvisionResult<()> {
        self.record("patch_cell_view", &format!("{dashboard_id}/{cell_id}"))
    }

    async fn delete_dashboard(&self, dashboard_id: &str) -> ProvisionResult<()> {
        self.record("delete_dashboard", dashboard_id)
    }

    async fn list_dashboards(&self) -> ProvisionResult<Vec<ResourceEntry>> {
        self.record("list_dashboards", "")?;
        Ok(self.dashboards.lock().unwrap().clone())
    }

    async fn grant_access(
        &self,
        _org_id: &str,
        user_id: &str,
        user_name: &str,
        _bucket_id: &str,
        _dashboard_id: &str,
    ) -> ProvisionResult<String> {
        self.record("grant_access", user_name)?;
        let id = self.fresh_id("grant");
        self.grants
            .lock()
            .unwrap()
            .push((id.clone(), user_id.to_string()));
        Ok(id)
    }

    async fn list_user_grants(&self, user_id: &str) -> ProvisionResult<Vec<String>> {
        self.record("list_user_grants", user_id)?;
        Ok(self
            .grants
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, uid)| uid == user_id)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn revoke_grant(&self, grant_id: &str) -> ProvisionResult<()> {
        self.record("revoke_grant", grant_id)
    }
}

/// Counters backed by atomics, for asserting classification.
#[derive(Default)]
pub struct TestCounters {
    pub processed: AtomicU64,
    pub ignored: AtomicU64,
    pub failed: AtomicU64,
    /// 1 = up, 0 = down, u64::MAX = never reported
    pub connection: AtomicU64,
}

impl TestCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connection: AtomicU64::new(u64::MAX),
            ..Self::default()
        })
    }
}

impl Counters for TestCounters {
    fn connection(&self, health: ConnectionHealth) {
        let value = match health {
            ConnectionHealth::Up => 1,
            ConnectionHealth::Down => 0,
        };
        self.connection.store(value, Ordering::SeqCst);
    }

    fn processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn ignored(&self) {
        self.ignored.fetch_add(1, Ordering::SeqCst);
    }

    fn failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Dead-letter sink that captures records in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<DeadLetterRecord>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<DeadLetterRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingSink {
    async fn send(&self, record: DeadLetterRecord) -> ProvisionResult<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}
