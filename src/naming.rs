//! Deterministic resource naming and credential generation
//!
//! Every remote resource created for an application carries a name derived
//! purely from the normalized application identifier, so the same application
//! always maps to the same resource set. Credential secrets are the one
//! exception: they are freshly generated on every call.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Entropy of a generated credential secret, in bytes.
const SECRET_BYTES: usize = 32;

/// Resource kinds that take a `neb_{app}_{kind}` name.
///
/// Dashboards are named separately via [`dashboard_title`] since they carry a
/// human-facing title rather than a machine name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Time-series data bucket
    Bucket,
    /// Metrics scraper writing into the bucket
    Scraper,
    /// Per-application user
    User,
    /// Dashboard variable listing measurements
    VarMetricsList,
    /// Dashboard variable listing field keys
    VarFieldsList,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Bucket => write!(f, "bucket"),
            ResourceKind::Scraper => write!(f, "scraper"),
            ResourceKind::User => write!(f, "user"),
            ResourceKind::VarMetricsList => write!(f, "var_metrics_list"),
            ResourceKind::VarFieldsList => write!(f, "var_fields_list"),
        }
    }
}

/// Normalize an application identifier.
///
/// Trims surrounding whitespace and replaces every character outside
/// `[A-Za-z0-9_]` with `_`. Idempotent: normalizing an already-normalized
/// identifier is a no-op.
pub fn normalize(app_id: &str) -> String {
    app_id
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Deterministic name for a resource of the given kind.
///
/// Stable across calls for the same `(kind, normalized id)` pair.
pub fn name_of(kind: ResourceKind, norm_id: &str) -> String {
    format!("neb_{norm_id}_{kind}")
}

/// Human-facing dashboard title for an application.
pub fn dashboard_title(norm_id: &str) -> String {
    format!("Nebulous Dashboard {norm_id}")
}

/// Generate a URL-safe credential secret with [`SECRET_BYTES`] of entropy.
///
/// Never deterministic; two calls yield distinct secrets.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn normalize_replaces_disallowed_characters() {
        assert_eq!(normalize("my-app.1"), "my_app_1");
        assert_eq!(normalize("  app one  "), "app_one");
        assert_eq!(normalize("Already_OK_42"), "Already_OK_42");
    }

    #[test]
    fn normalize_collapses_equivalent_inputs() {
        assert_eq!(normalize("app-1"), normalize("app.1"));
        assert_eq!(normalize("app 1"), normalize("app/1"));
    }

    #[test]
    fn names_are_stable_and_distinct_per_kind() {
        let id = normalize("app1");
        assert_eq!(name_of(ResourceKind::Bucket, &id), "neb_app1_bucket");
        assert_eq!(name_of(ResourceKind::Bucket, &id), name_of(ResourceKind::Bucket, &id));
        assert_eq!(name_of(ResourceKind::Scraper, &id), "neb_app1_scraper");
        assert_eq!(name_of(ResourceKind::User, &id), "neb_app1_user");
        assert_eq!(
            name_of(ResourceKind::VarMetricsList, &id),
            "neb_app1_var_metrics_list"
        );
        assert_eq!(
            name_of(ResourceKind::VarFieldsList, &id),
            "neb_app1_var_fields_list"
        );
    }

    #[test]
    fn distinct_ids_yield_distinct_names() {
        assert_ne!(
            name_of(ResourceKind::Bucket, &normalize("app1")),
            name_of(ResourceKind::Bucket, &normalize("app2"))
        );
    }

    #[test]
    fn dashboard_title_format() {
        assert_eq!(dashboard_title("app1"), "Nebulous Dashboard app1");
    }

    #[test]
    fn secrets_are_unique_and_url_safe() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        // 32 bytes of entropy encode to 43 base64url characters
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(input in ".*") {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalized_output_is_in_alphabet(input in ".*") {
            let norm = normalize(&input);
            prop_assert!(norm.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }
}
