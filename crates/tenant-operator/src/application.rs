//! Argo CD Application custom resource
//!
//! The fields the operator writes are typed. Every other key under `spec` lands
//! in an `other` map on the struct it belongs to, so a live object carrying
//! keys the operator never writes compares unequal to the desired one. Status
//! keeps `health` typed and carries everything else through untouched.

use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{defaults, labels};
use crate::tenant::{HelmValues, TenantSpec};

/// Application spec - what to deploy, from where, and into which namespace
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "Application",
    plural = "applications",
    shortname = "app",
    namespaced = true,
    status = "ApplicationStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Health", "type":"string", "jsonPath":".status.health.status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub project: String,
    pub source: ApplicationSource,
    pub destination: ApplicationDestination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_policy: Option<SyncPolicy>,
    /// Keys the operator does not write (`sources`, `ignoreDifferences`, ...)
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm: Option<HelmSource>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    /// Structured values; omitted when the tenant has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<HelmValues>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDestination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automated: Option<AutomatedSync>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedSync {
    #[serde(default)]
    pub prune: bool,
    #[serde(default)]
    pub self_heal: bool,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Application status as reported by the GitOps controller
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,
    /// Remaining status fields (sync, resources, history, ...)
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HealthStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Build the desired Application for a tenant
///
/// Deterministic in `tenant` and `gitops_namespace`: the same inputs always
/// produce an equal object, which is what makes the update check idempotent.
pub fn build_application(tenant: &TenantSpec, gitops_namespace: &str) -> Application {
    let name = tenant.namespace_name();

    let repo_url = non_empty_or(&tenant.repo_url, defaults::REPO_URL);
    let path = non_empty_or(&tenant.path, defaults::PATH);
    let target_revision = tenant
        .target_revision
        .as_deref()
        .filter(|r| !r.is_empty())
        .unwrap_or(defaults::TARGET_REVISION)
        .to_string();

    let spec = ApplicationSpec {
        project: defaults::PROJECT.to_string(),
        source: ApplicationSource {
            repo_url,
            path: Some(path),
            target_revision: Some(target_revision),
            helm: Some(HelmSource {
                release_name: Some(name.clone()),
                values: tenant.helm_values.clone().filter(|v| !v.is_empty()),
                other: BTreeMap::new(),
            }),
            other: BTreeMap::new(),
        },
        destination: ApplicationDestination {
            server: Some(defaults::DESTINATION_SERVER.to_string()),
            namespace: Some(name.clone()),
            other: BTreeMap::new(),
        },
        sync_policy: Some(SyncPolicy {
            automated: Some(AutomatedSync {
                prune: true,
                self_heal: true,
                other: BTreeMap::new(),
            }),
            other: BTreeMap::new(),
        }),
        other: BTreeMap::new(),
    };

    Application {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(gitops_namespace.to_string()),
            labels: Some(application_labels(&tenant.id)),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

fn application_labels(tenant_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::IS_TENANT.to_string(), "true".to_string()),
        (labels::TENANT.to_string(), tenant_id.to_string()),
    ])
}

fn non_empty_or(value: &str, default: &str) -> String {
    let chosen = if value.is_empty() { default } else { value };
    chosen.to_string()
}
