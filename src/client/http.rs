//! HTTP implementation of [`ResourceClient`] against the backend's v2 REST API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{DashboardCell, DashboardCreated, ResourceClient, ResourceEntry};
use crate::errors::{ProvisionError, ProvisionResult};

fn default_timeout() -> u64 {
    30
}

/// Configuration for the backend connection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResourceClientConfig {
    /// Backend base URL, e.g. "http://influxdb:8086"
    pub base_url: String,
    /// Admin token for authentication
    pub admin_token: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ResourceClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://influxdb:8086".to_string(),
            admin_token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Reqwest-backed resource client.
pub struct HttpResourceClient {
    config: ResourceClientConfig,
    client: Client,
}

impl HttpResourceClient {
    /// Build an HTTP client with token auth headers applied to every request.
    pub fn new(config: ResourceClientConfig) -> ProvisionResult<Self> {
        info!("Connecting to resource backend at {}", config.base_url);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    "Authorization",
                    format!("Token {}", config.admin_token).parse().map_err(|e| {
                        ProvisionError::Configuration(format!("invalid admin token: {e}"))
                    })?,
                );
                headers.insert(
                    "Content-Type",
                    "application/json".parse().map_err(|e| {
                        ProvisionError::Configuration(format!("invalid header: {e}"))
                    })?,
                );
                headers
            })
            .build()
            .map_err(|e| {
                ProvisionError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    /// Verify backend connectivity.
    pub async fn health_check(&self) -> ProvisionResult<()> {
        let url = format!("{}/api/v2/ping", self.config.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            ProvisionError::ResourceApi {
                operation: "health check".to_string(),
                message: e.to_string(),
            }
        })?;

        if response.status().is_success() {
            debug!("Backend health check passed");
            Ok(())
        } else {
            Err(ProvisionError::ResourceApi {
                operation: "health check".to_string(),
                message: format!("backend returned status {}", response.status()),
            })
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn api_error(operation: &str, response: reqwest::Response) -> ProvisionError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ProvisionError::ResourceApi {
            operation: operation.to_string(),
            message: format!("{status}: {body}"),
        }
    }

    /// POST a JSON payload, expecting 201 Created with a JSON body.
    async fn post_created(&self, path: &str, operation: &str, payload: &Value) -> ProvisionResult<Value> {
        let response = self
            .client
            .post(self.url(path))
            .json(payload)
            .send()
            .await
            .map_err(|e| ProvisionError::ResourceApi {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;

        if response.status() == StatusCode::CREATED || response.status() == StatusCode::OK {
            response.json().await.map_err(|e| ProvisionError::ResourceApi {
                operation: operation.to_string(),
                message: format!("invalid response body: {e}"),
            })
        } else {
            Err(Self::api_error(operation, response).await)
        }
    }

    /// POST a JSON payload, expecting 204 No Content.
    async fn post_no_content(&self, path: &str, operation: &str, payload: &Value) -> ProvisionResult<()> {
        let response = self
            .client
            .post(self.url(path))
            .json(payload)
            .send()
            .await
            .map_err(|e| ProvisionError::ResourceApi {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;

        if response.status() == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(Self::api_error(operation, response).await)
        }
    }

    /// GET a listing endpoint, expecting 200 with a JSON body.
    async fn get_json(&self, path: &str, operation: &str) -> ProvisionResult<Value> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ProvisionError::ResourceApi {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;

        if response.status() == StatusCode::OK {
            response.json().await.map_err(|e| ProvisionError::ResourceApi {
                operation: operation.to_string(),
                message: format!("invalid response body: {e}"),
            })
        } else {
            Err(Self::api_error(operation, response).await)
        }
    }

    /// DELETE a resource, expecting 204 No Content.
    async fn delete(&self, path: &str, operation: &str) -> ProvisionResult<()> {
        debug!(%operation, %path, "Deleting resource");
        let response = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .map_err(|e| ProvisionError::ResourceApi {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;

        if response.status() == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(Self::api_error(operation, response).await)
        }
    }

    fn extract_id(operation: &str, body: &Value) -> ProvisionResult<String> {
        body["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProvisionError::ResourceApi {
                operation: operation.to_string(),
                message: "response missing 'id'".to_string(),
            })
    }

    fn extract_entries(body: &Value, section: &str) -> Vec<ResourceEntry> {
        body[section]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(ResourceEntry {
                            id: item["id"].as_str()?.to_string(),
                            name: item["name"].as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn find_org(&self, name: &str) -> ProvisionResult<String> {
        let body = self.get_json("/api/v2/orgs", "list orgs").await?;
        let org = body["orgs"]
            .as_array()
            .and_then(|orgs| orgs.iter().find(|o| o["name"].as_str() == Some(name)));

        match org {
            Some(org) => {
                let id = Self::extract_id("find org", org)?;
                info!(org = %name, %id, "Organization found");
                Ok(id)
            }
            None => Err(ProvisionError::OrgNotFound(name.to_string())),
        }
    }

    async fn create_bucket(
        &self,
        org_id: &str,
        name: &str,
        retention_secs: u64,
    ) -> ProvisionResult<String> {
        let payload = json!({
            "orgID": org_id,
            "name": name,
            "retentionRules": [{"type": "expire", "everySeconds": retention_secs}],
            "shardGroupDuration": "1h",
        });
        let body = self.post_created("/api/v2/buckets", "create bucket", &payload).await?;
        info!(bucket = %name, "Bucket created");
        Self::extract_id("create bucket", &body)
    }

    async fn delete_bucket(&self, bucket_id: &str) -> ProvisionResult<()> {
        self.delete(&format!("/api/v2/buckets/{bucket_id}"), "delete bucket").await
    }

    async fn list_buckets(&self, org_id: &str) -> ProvisionResult<Vec<ResourceEntry>> {
        let body = self
            .get_json(&format!("/api/v2/buckets?orgID={org_id}"), "list buckets")
            .await?;
        Ok(Self::extract_entries(&body, "buckets"))
    }

    async fn create_scraper(
        &self,
        org_id: &str,
        bucket_id: &str,
        name: &str,
        target_url: &str,
    ) -> ProvisionResult<String> {
        let payload = json!({
            "name": name,
            "orgID": org_id,
            "bucketID": bucket_id,
            "url": target_url,
        });
        let body = self.post_created("/api/v2/scrapers", "create scraper", &payload).await?;
        info!(scraper = %name, "Scraper created");
        Self::extract_id("create scraper", &body)
    }

    async fn delete_scraper(&self, scraper_id: &str) -> ProvisionResult<()> {
        self.delete(&format!("/api/v2/scrapers/{scraper_id}"), "delete scraper").await
    }

    async fn list_scrapers(&self) -> ProvisionResult<Vec<ResourceEntry>> {
        let body = self.get_json("/api/v2/scrapers", "list scrapers").await?;
        // scraper listings nest under "configurations"
        Ok(Self::extract_entries(&body, "configurations"))
    }

    async fn create_user(
        &self,
        org_id: &str,
        name: &str,
        password: &str,
    ) -> ProvisionResult<String> {
        let payload = json!({
            "name": name,
            "password": password,
            "orgID": org_id,
        });
        let body = self.post_created("/api/v2/users", "create user", &payload).await?;
        info!(user = %name, "User created");
        Self::extract_id("create user", &body)
    }

    async fn set_user_password(&self, user_id: &str, password: &str) -> ProvisionResult<()> {
        let payload = json!({ "password": password });
        self.post_no_content(
            &format!("/api/v2/users/{user_id}/password"),
            "set user password",
            &payload,
        )
        .await
    }

    async fn delete_user(&self, user_id: &str) -> ProvisionResult<()> {
        self.delete(&format!("/api/v2/users/{user_id}"), "delete user").await
    }

    async fn list_users(&self) -> ProvisionResult<Vec<ResourceEntry>> {
        let body = self.get_json("/api/v2/users", "list users").await?;
        Ok(Self::extract_entries(&body, "users"))
    }

    async fn create_variable(
        &self,
        org_id: &str,
        name: &str,
        flux_query: &str,
    ) -> ProvisionResult<String> {
        let payload = json!({
            "arguments": {
                "type": "query",
                "values": {
                    "language": "flux",
                    "query": flux_query,
                }
            },
            "name": name,
            "orgID": org_id,
        });
        let body = self.post_created("/api/v2/variables", "create variable", &payload).await?;
        info!(variable = %name, "Variable created");
        Self::extract_id("create variable", &body)
    }

    async fn delete_variable(&self, variable_id: &str) -> ProvisionResult<()> {
        self.delete(&format!("/api/v2/variables/{variable_id}"), "delete variable").await
    }

    async fn list_variables(&self) -> ProvisionResult<Vec<ResourceEntry>> {
        let body = self.get_json("/api/v2/variables", "list variables").await?;
        Ok(Self::extract_entries(&body, "variables"))
    }

    async fn create_dashboard(&self, payload: &Value) -> ProvisionResult<DashboardCreated> {
        let body = self.post_created("/api/v2/dashboards", "create dashboard", payload).await?;
        let id = Self::extract_id("create dashboard", &body)?;
        let cells: Vec<DashboardCell> = body["cells"]
            .as_array()
            .map(|cells| {
                cells
                    .iter()
                    .filter_map(|c| {
                        Some(DashboardCell {
                            id: c["id"].as_str()?.to_string(),
                            name: c["name"].as_str().unwrap_or_default().to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        info!(dashboard = %id, cell_count = cells.len(), "Dashboard created");
        Ok(DashboardCreated { id, cells })
    }

    async fn patch_cell_view(
        &self,
        dashboard_id: &str,
        cell_id: &str,
        payload: &Value,
    ) -> ProvisionResult<()> {
        let path = format!("/api/v2/dashboards/{dashboard_id}/cells/{cell_id}/view");
        let response = self
            .client
            .patch(self.url(&path))
            .json(payload)
            .send()
            .await
            .map_err(|e| ProvisionError::ResourceApi {
                operation: "patch cell view".to_string(),
                message: e.to_string(),
            })?;

        if response.status() == StatusCode::OK {
            debug!(cell = %cell_id, "Cell view patched");
            Ok(())
        } else {
            Err(Self::api_error("patch cell view", response).await)
        }
    }

    async fn delete_dashboard(&self, dashboard_id: &str) -> ProvisionResult<()> {
        self.delete(&format!("/api/v2/dashboards/{dashboard_id}"), "delete dashboard").await
    }

    async fn list_dashboards(&self) -> ProvisionResult<Vec<ResourceEntry>> {
        let body = self.get_json("/api/v2/dashboards", "list dashboards").await?;
        Ok(Self::extract_entries(&body, "dashboards"))
    }

    async fn grant_access(
        &self,
        org_id: &str,
        user_id: &str,
        user_name: &str,
        bucket_id: &str,
        dashboard_id: &str,
    ) -> ProvisionResult<String> {
        let payload = json!({
            "orgID": org_id,
            "userID": user_id,
            "status": "active",
            "description": format!("{user_name}'s token"),
            "permissions": [
                {"action": "read",  "resource": {"type": "buckets", "id": bucket_id}},
                {"action": "write", "resource": {"type": "buckets", "id": bucket_id}},
                {"action": "read",  "resource": {"type": "dashboards", "id": dashboard_id}},
                {"action": "write", "resource": {"type": "dashboards", "id": dashboard_id}},
            ],
        });
        let body = self
            .post_created("/api/v2/authorizations", "grant access", &payload)
            .await?;
        info!(user = %user_name, "Access granted");
        Self::extract_id("grant access", &body)
    }

    async fn list_user_grants(&self, user_id: &str) -> ProvisionResult<Vec<String>> {
        let body = self.get_json("/api/v2/authorizations", "list grants").await?;
        Ok(body["authorizations"]
            .as_array()
            .map(|grants| {
                grants
                    .iter()
                    .filter(|g| g["userID"].as_str() == Some(user_id))
                    .filter_map(|g| g["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn revoke_grant(&self, grant_id: &str) -> ProvisionResult<()> {
        self.delete(&format!("/api/v2/authorizations/{grant_id}"), "revoke grant").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_default() {
        let config = ResourceClientConfig::default();
        assert_eq!(config.base_url, "http://influxdb:8086");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn entries_follow_listing_order() {
        let body = json!({
            "buckets": [
                {"id": "b1", "name": "neb_a_bucket"},
                {"id": "b2", "name": "neb_b_bucket"},
                {"name": "no-id-skipped"},
            ]
        });
        let entries = HttpResourceClient::extract_entries(&body, "buckets");
        assert_eq!(
            entries,
            vec![
                ResourceEntry { id: "b1".into(), name: "neb_a_bucket".into() },
                ResourceEntry { id: "b2".into(), name: "neb_b_bucket".into() },
            ]
        );
    }

    #[test]
    fn missing_id_is_an_api_error() {
        let err = HttpResourceClient::extract_id("create bucket", &json!({})).unwrap_err();
        assert!(err.to_string().contains("create bucket"));
    }
}
