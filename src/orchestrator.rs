//! Provisioning workflows over the per-application resource set
//!
//! One orchestrator instance drives one workflow at a time: create the full
//! dependency-ordered resource set, locate it by deterministic names, or tear
//! it down best-effort in reverse order. The ordering is fixed — it encodes
//! the dependency graph (scraper writes into the bucket, the grant references
//! user, bucket and dashboard, the fields variable references the metrics
//! variable by name).

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::{ResourceClient, ResourceEntry};
use crate::errors::{ProvisionError, ProvisionResult};
use crate::naming::{self, ResourceKind};
use crate::state::{ProvisioningIdentity, ProvisioningState, StateStore};
use crate::templates::{view_for_cell, TemplateSet};

/// Bucket retention, fixed at one hour. Configuration constant, not user input.
pub const BUCKET_RETENTION_SECS: u64 = 3600;

/// Outcome of a single teardown step.
#[derive(Debug)]
pub struct TeardownStep {
    /// Step name, e.g. "bucket"
    pub name: &'static str,
    pub result: ProvisionResult<()>,
}

/// Per-step outcomes of a best-effort teardown, in execution order.
///
/// A failing step never blocks its successors; the report records exactly
/// which steps failed instead of hiding them in logs.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
}

impl TeardownReport {
    fn record(&mut self, name: &'static str, result: ProvisionResult<()>) {
        if let Err(ref e) = result {
            warn!(step = name, error = %e, "Teardown step failed, continuing");
        }
        self.steps.push(TeardownStep { name, result });
    }

    /// True when every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|s| s.result.is_ok())
    }

    /// Names of the steps that failed.
    pub fn failed_steps(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter(|s| s.result.is_err())
            .map(|s| s.name)
            .collect()
    }
}

/// Creates, locates, persists and destroys the dependent resource set for one
/// application.
pub struct ProvisioningOrchestrator {
    client: Arc<dyn ResourceClient>,
    org_name: String,
    scraper_target_url: String,
    templates: TemplateSet,
    store: StateStore,
}

impl ProvisioningOrchestrator {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        org_name: impl Into<String>,
        scraper_target_url: impl Into<String>,
        templates: TemplateSet,
        store: StateStore,
    ) -> Self {
        Self {
            client,
            org_name: org_name.into(),
            scraper_target_url: scraper_target_url.into(),
            templates,
            store,
        }
    }

    /// Create the full resource set for an application, in dependency order.
    ///
    /// A failure at any step aborts the remaining steps and propagates; already
    /// created resources are not rolled back. On success the complete state is
    /// persisted for crash recovery and lookup-free deletion.
    pub async fn create_all(&self, app_id: &str) -> ProvisionResult<ProvisioningState> {
        let identity = ProvisioningIdentity::derive(app_id);
        let mut state = ProvisioningState::from_identity(&identity);
        info!(app_id = %state.app_id, "Creating resource set");

        // Org lookup failure is fatal and non-retryable from this layer.
        state.org_id = self.client.find_org(&self.org_name).await?;

        state.bucket_id = self
            .client
            .create_bucket(&state.org_id, &state.bucket_name, BUCKET_RETENTION_SECS)
            .await?;

        state.scraper_id = self
            .client
            .create_scraper(
                &state.org_id,
                &state.bucket_id,
                &state.scraper_name,
                &self.scraper_target_url,
            )
            .await?;

        state.user_password = naming::generate_secret();
        state.user_id = self
            .client
            .create_user(&state.org_id, &state.user_name, &state.user_password)
            .await?;
        self.client
            .set_user_password(&state.user_id, &state.user_password)
            .await?;

        state.var_metrics_id = self
            .client
            .create_variable(
                &state.org_id,
                &state.var_metrics_name,
                &metrics_variable_query(&state.bucket_name),
            )
            .await?;
        state.var_fields_id = self
            .client
            .create_variable(
                &state.org_id,
                &state.var_fields_name,
                &fields_variable_query(&state.bucket_name, &state.var_metrics_name),
            )
            .await?;

        state.dashboard_id = self.create_dashboard(&state).await?;

        self.client
            .grant_access(
                &state.org_id,
                &state.user_id,
                &state.user_name,
                &state.bucket_id,
                &state.dashboard_id,
            )
            .await?;

        self.store.save(&state)?;
        info!(app_id = %state.app_id, "Resource set created");
        Ok(state)
    }

    /// Create the dashboard from its template and patch each cell's view from
    /// the chart templates, matched by cell name.
    async fn create_dashboard(&self, state: &ProvisioningState) -> ProvisionResult<String> {
        let dashboard_tpl = self.templates.render_dashboard(state)?;
        let created = self.client.create_dashboard(&dashboard_tpl).await?;

        let charts = self.templates.render_charts(state)?;
        for cell in &created.cells {
            let view = view_for_cell(&charts, &dashboard_tpl, &cell.name)?;
            self.client
                .patch_cell_view(&created.id, &cell.id, &view)
                .await?;
        }

        Ok(created.id)
    }

    /// Tear down every resource in the reverse order of creation.
    ///
    /// Best-effort: each step's failure is recorded in the report and the
    /// remaining steps still run. Partial external state is worse than a
    /// partially-completed cleanup that keeps trying.
    pub async fn delete_all(&self, state: &ProvisioningState) -> TeardownReport {
        info!(app_id = %state.app_id, "Deleting resource set");
        let mut report = TeardownReport::default();

        report.record("revoke_grants", self.revoke_grants(&state.user_id).await);
        report.record(
            "dashboard",
            self.client.delete_dashboard(&state.dashboard_id).await,
        );
        report.record("variables", self.delete_variables(state).await);
        report.record("user", self.client.delete_user(&state.user_id).await);
        report.record("scraper", self.client.delete_scraper(&state.scraper_id).await);
        report.record("bucket", self.client.delete_bucket(&state.bucket_id).await);

        if report.is_clean() {
            info!(app_id = %state.app_id, "Resource set deleted");
        } else {
            error!(
                app_id = %state.app_id,
                failed = ?report.failed_steps(),
                "Teardown finished with failed steps"
            );
        }
        report
    }

    async fn revoke_grants(&self, user_id: &str) -> ProvisionResult<()> {
        let grants = self.client.list_user_grants(user_id).await?;
        for grant_id in grants {
            self.client.revoke_grant(&grant_id).await?;
        }
        Ok(())
    }

    /// Delete both variables; attempt the second even if the first fails.
    async fn delete_variables(&self, state: &ProvisioningState) -> ProvisionResult<()> {
        let metrics = self.client.delete_variable(&state.var_metrics_id).await;
        let fields = self.client.delete_variable(&state.var_fields_id).await;
        metrics.and(fields)
    }

    /// Locate the full resource set for an application by substring match over
    /// the backend listings.
    ///
    /// Any kind not found is fatal to the whole lookup — callers must never
    /// receive a partially populated state from here. The returned state is
    /// ephemeral and never persisted.
    pub async fn find_all(&self, app_id: &str) -> ProvisionResult<ProvisioningState> {
        let identity = ProvisioningIdentity::derive(app_id);
        let mut state = ProvisioningState::from_identity(&identity);
        info!(app_id = %state.app_id, "Looking up resource set");

        state.org_id = self.client.find_org(&self.org_name).await?;

        let found = Self::match_entry(
            self.client.list_buckets(&state.org_id).await?,
            ResourceKind::Bucket,
            &identity.bucket_name,
        )?;
        (state.bucket_id, state.bucket_name) = (found.id, found.name);

        let found = Self::match_entry(
            self.client.list_scrapers().await?,
            ResourceKind::Scraper,
            &identity.scraper_name,
        )?;
        (state.scraper_id, state.scraper_name) = (found.id, found.name);

        let found = Self::match_entry(
            self.client.list_users().await?,
            ResourceKind::User,
            &identity.user_name,
        )?;
        (state.user_id, state.user_name) = (found.id, found.name);

        let found = Self::match_entry(
            self.client.list_variables().await?,
            ResourceKind::VarMetricsList,
            &identity.var_metrics_name,
        )?;
        (state.var_metrics_id, state.var_metrics_name) = (found.id, found.name);

        let found = Self::match_entry(
            self.client.list_variables().await?,
            ResourceKind::VarFieldsList,
            &identity.var_fields_name,
        )?;
        (state.var_fields_id, state.var_fields_name) = (found.id, found.name);

        let dashboards = self.client.list_dashboards().await?;
        let found = dashboards
            .into_iter()
            .find(|entry| entry.name.contains(&identity.dashboard_name))
            .ok_or_else(|| ProvisionError::ResourceNotFound {
                kind: "dashboard".to_string(),
                name: identity.dashboard_name.clone(),
            })?;
        (state.dashboard_id, state.dashboard_name) = (found.id, found.name);

        info!(
            app_id = %state.app_id,
            bucket = %state.bucket_id,
            scraper = %state.scraper_id,
            user = %state.user_id,
            dashboard = %state.dashboard_id,
            "Resource set found"
        );
        Ok(state)
    }

    /// First entry whose name contains the deterministic name, in listing order.
    fn match_entry(
        entries: Vec<ResourceEntry>,
        kind: ResourceKind,
        wanted: &str,
    ) -> ProvisionResult<ResourceEntry> {
        entries
            .into_iter()
            .find(|entry| entry.name.contains(wanted))
            .ok_or_else(|| ProvisionError::ResourceNotFound {
                kind: kind.to_string(),
                name: wanted.to_string(),
            })
    }

    /// Load the persisted state for an application, for the lookup-free delete
    /// path. Tolerates the backend no longer agreeing with local records.
    pub fn load_state(&self, app_id: &str) -> ProvisionResult<ProvisioningState> {
        self.store.load(&naming::normalize(app_id))
    }

    /// Persist a state explicitly (crash recovery checkpoint).
    pub fn save_state(&self, state: &ProvisioningState) -> ProvisionResult<()> {
        self.store.save(state)
    }
}

/// Flux query listing measurements in the application's bucket.
fn metrics_variable_query(bucket_name: &str) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\n\
         schema.measurements(bucket: \"{bucket_name}\")"
    )
}

/// Flux query listing field keys, scoped to the measurement currently selected
/// through the metrics variable and filtering out numeric and infinity names.
fn fields_variable_query(bucket_name: &str, metrics_var_name: &str) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\n\
         schema.fieldKeys(\n\
         \x20 bucket: \"{bucket_name}\",\n\
         \x20 predicate: (r) => r._measurement == v.{metrics_var_name}\n\
         \x20                   and r._field !~ /^(\\d.*)/\n\
         \x20                   and r._field !~ /^(?i)(\\+inf|-inf)$/\n\
         )"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn metrics_query_targets_bucket() {
        let q = metrics_variable_query("neb_app1_bucket");
        assert!(q.contains("schema.measurements(bucket: \"neb_app1_bucket\")"));
    }

    #[test]
    fn fields_query_references_metrics_variable() {
        let q = fields_variable_query("neb_app1_bucket", "neb_app1_var_metrics_list");
        assert!(q.contains("bucket: \"neb_app1_bucket\""));
        assert!(q.contains("v.neb_app1_var_metrics_list"));
        assert!(q.contains("(\\+inf|-inf)"));
    }

    #[test]
    fn match_entry_takes_first_substring_match() {
        let entries = vec![
            ResourceEntry { id: "1".into(), name: "other".into() },
            ResourceEntry { id: "2".into(), name: "prefix_neb_a_bucket_suffix".into() },
            ResourceEntry { id: "3".into(), name: "neb_a_bucket".into() },
        ];
        let found =
            ProvisioningOrchestrator::match_entry(entries, ResourceKind::Bucket, "neb_a_bucket")
                .unwrap();
        assert_eq!(found.id, "2");
    }

    #[test]
    fn match_entry_reports_kind_and_name() {
        let err = ProvisioningOrchestrator::match_entry(vec![], ResourceKind::User, "neb_a_user")
            .unwrap_err();
        match err {
            ProvisionError::ResourceNotFound { kind, name } => {
                assert_eq!(kind, "user");
                assert_eq!(name, "neb_a_user");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
