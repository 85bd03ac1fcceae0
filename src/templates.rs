//! Dashboard and chart template handling
//!
//! Templates are YAML documents with `{field}` placeholders. Placeholders are
//! substituted textually from the flat provisioning state (minus the excluded
//! fields) before parsing, then converted to JSON for the resource API.

use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::errors::{ProvisionError, ProvisionResult};
use crate::state::ProvisioningState;

/// Fields never substituted into a template.
pub const TEMPLATE_EXCLUDED_FIELDS: &[&str] = &["headers", "user_password"];

/// Chart template key used when a cell names none.
pub const DEFAULT_CHART_TEMPLATE: &str = "default_chart";

/// A pair of template documents: the dashboard layout and the per-cell chart
/// views it references.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    dashboard: String,
    charts: String,
}

impl TemplateSet {
    /// Load both template files from disk.
    pub fn load(dashboard_path: &Path, charts_path: &Path) -> ProvisionResult<Self> {
        let dashboard = std::fs::read_to_string(dashboard_path)
            .map_err(|e| ProvisionError::Template(format!("read {dashboard_path:?}: {e}")))?;
        let charts = std::fs::read_to_string(charts_path)
            .map_err(|e| ProvisionError::Template(format!("read {charts_path:?}: {e}")))?;
        Ok(Self { dashboard, charts })
    }

    /// Build from in-memory documents. Used by tests and embedded defaults.
    pub fn from_strings(dashboard: impl Into<String>, charts: impl Into<String>) -> Self {
        Self {
            dashboard: dashboard.into(),
            charts: charts.into(),
        }
    }

    /// Render the dashboard template against a state.
    pub fn render_dashboard(&self, state: &ProvisioningState) -> ProvisionResult<Value> {
        render(&self.dashboard, state)
    }

    /// Render the chart template mapping against a state.
    pub fn render_charts(&self, state: &ProvisioningState) -> ProvisionResult<Value> {
        render(&self.charts, state)
    }
}

/// Substitute `{field}` placeholders and parse the result as YAML-into-JSON.
fn render(template: &str, state: &ProvisioningState) -> ProvisionResult<Value> {
    let mut text = template.to_string();
    for (field, value) in state.fields() {
        if TEMPLATE_EXCLUDED_FIELDS.contains(&field.as_str()) {
            continue;
        }
        text = text.replace(&format!("{{{field}}}"), &value);
    }

    let yaml: serde_yaml::Value = serde_yaml::from_str(&text)
        .map_err(|e| ProvisionError::Template(format!("parse template: {e}")))?;
    let json = serde_json::to_value(yaml)
        .map_err(|e| ProvisionError::Template(format!("convert template: {e}")))?;

    debug!("Rendered template");
    Ok(json)
}

/// Pick the chart view payload for a dashboard cell.
///
/// The cell's entry in the dashboard template names its chart via the
/// `cell-template` key; absent or null falls back to [`DEFAULT_CHART_TEMPLATE`].
/// The returned payload carries the cell's display name.
pub fn view_for_cell(
    charts: &Value,
    dashboard_tpl: &Value,
    cell_name: &str,
) -> ProvisionResult<Value> {
    let template_key = dashboard_tpl["cells"]
        .as_array()
        .and_then(|cells| cells.iter().find(|c| c["name"].as_str() == Some(cell_name)))
        .and_then(|c| c["cell-template"].as_str())
        .unwrap_or(DEFAULT_CHART_TEMPLATE);

    let mut payload = charts
        .get(template_key)
        .cloned()
        .ok_or_else(|| {
            ProvisionError::Template(format!("chart template '{template_key}' not defined"))
        })?;

    let display = if cell_name.is_empty() { "Unnamed cell" } else { cell_name };
    if let Value::Object(map) = &mut payload {
        map.insert("name".to_string(), Value::String(display.to_string()));
    }
    Ok(payload)
}
