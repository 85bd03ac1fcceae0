//! Environment-driven service configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::client::ResourceClientConfig;
use crate::errors::{ProvisionError, ProvisionResult};
use crate::ingest::{BackoffPolicy, BusConfig};

/// Full configuration for the provisioner process.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bus connection settings
    pub bus: BusConfig,
    /// Resource backend settings
    pub backend: ResourceClientConfig,
    /// Organization owning all provisioned resources
    pub org_name: String,
    /// Metrics endpoint every scraper is pointed at
    pub scraper_target_url: String,
    /// Directory for persisted per-application state records
    pub state_dir: PathBuf,
    /// Dashboard template file
    pub dashboard_template: PathBuf,
    /// Chart template file
    pub charts_template: PathBuf,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl ServiceConfig {
    /// Load configuration from environment variables, with the service's
    /// conventional defaults. The admin token is the only required setting.
    pub fn from_env() -> ProvisionResult<Self> {
        let admin_token = std::env::var("INFLUXDB_ADMIN_TOKEN")
            .map_err(|_| ProvisionError::Configuration("INFLUXDB_ADMIN_TOKEN not set".into()))?;

        Ok(Self {
            bus: BusConfig {
                url: env_or("BROKER_URL", "nats://localhost:4222"),
                topic: env_or("TOPIC_NAME", "new_app_topic"),
                heartbeat: Duration::from_secs(10),
                backoff: BackoffPolicy::default(),
            },
            backend: ResourceClientConfig {
                base_url: env_or("INFLUXDB_URL", "http://influxdb:8086"),
                admin_token,
                timeout_secs: 30,
            },
            org_name: env_or("INFLUXDB_ORG_NAME", "my-org"),
            scraper_target_url: env_or("SCRAPER_TARGET_URL", "http://localhost:8086/metrics"),
            state_dir: env_or("STATE_DIR", "app-states").into(),
            dashboard_template: env_or("DASHBOARD_TEMPLATE", "templates/dashboard-tpl.yaml").into(),
            charts_template: env_or("CHARTS_TEMPLATE", "templates/charts-tpl.yaml").into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn env_or_falls_back_to_default() {
        assert_eq!(env_or("NEB_PROVISIONER_UNSET_VAR", "fallback"), "fallback");
    }
}
