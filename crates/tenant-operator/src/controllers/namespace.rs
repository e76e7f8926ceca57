//! Tenant namespace reconciler
//!
//! Required labels are merged into whatever the namespace already carries;
//! labels added by other parties are never removed.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, info, instrument};

use super::{EnsureOutcome, ReconcileContext};
use crate::config::labels;
use crate::error::ReconcileError;
use crate::tenant::{namespace_name, TenantSpec};
use crate::validation::validate_tenant_id;

/// Labels every tenant namespace must carry
pub fn required_labels(tenant_id: &str, managed_by: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::IS_TENANT.to_string(), "true".to_string()),
        (labels::TENANT.to_string(), tenant_id.to_string()),
        (labels::MANAGED_BY.to_string(), managed_by.to_string()),
    ])
}

/// Write missing or wrong required labels into `current`.
///
/// Returns true if anything changed.
fn merge_labels(current: &mut BTreeMap<String, String>, required: &BTreeMap<String, String>) -> bool {
    let mut changed = false;
    for (key, value) in required {
        if current.get(key) != Some(value) {
            current.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Ensure the tenant namespace exists and carries the required labels
#[instrument(skip(ctx, tenant), fields(namespace = %tenant.namespace_name()))]
pub async fn ensure_namespace(
    ctx: &ReconcileContext,
    tenant: &TenantSpec,
) -> Result<EnsureOutcome, ReconcileError> {
    let name = tenant.namespace_name();
    let required = required_labels(&tenant.id, &ctx.gitops_managed_by);

    let existing = ctx
        .client
        .get_namespace(&name)
        .await
        .map_err(|e| ReconcileError::cluster("get namespace", &name, e))?;

    let Some(mut namespace) = existing else {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(required),
                ..Default::default()
            },
            ..Default::default()
        };
        ctx.client
            .create_namespace(&namespace)
            .await
            .map_err(|e| ReconcileError::cluster("create namespace", &name, e))?;
        info!(namespace = %name, "Created tenant namespace");
        return Ok(EnsureOutcome::Created);
    };

    if !merge_labels(namespace.labels_mut(), &required) {
        debug!(namespace = %name, "Namespace labels up to date");
        return Ok(EnsureOutcome::Unchanged);
    }

    ctx.client
        .replace_namespace(&namespace)
        .await
        .map_err(|e| ReconcileError::cluster("update namespace", &name, e))?;
    info!(namespace = %name, "Updated tenant namespace labels");
    Ok(EnsureOutcome::Updated)
}

/// Tenant ids that currently have a namespace in the cluster
///
/// Fails closed: a marked namespace whose tenant label is missing, malformed
/// or inconsistent with its name aborts the listing instead of being skipped.
#[instrument(skip(ctx))]
pub async fn list_managed_tenant_ids(ctx: &ReconcileContext) -> Result<Vec<String>, ReconcileError> {
    let namespaces = ctx
        .client
        .list_namespaces(labels::IS_TENANT_SELECTOR)
        .await
        .map_err(|e| ReconcileError::cluster("list namespaces", labels::IS_TENANT_SELECTOR, e))?;

    let ids = namespaces
        .iter()
        .map(tenant_id_of)
        .collect::<Result<Vec<_>, _>>()?;

    debug!(count = ids.len(), "Listed managed tenants");
    Ok(ids)
}

fn tenant_id_of(namespace: &Namespace) -> Result<String, ReconcileError> {
    let ns_name = namespace.name_any();
    let integrity = |reason: String| ReconcileError::Integrity {
        namespace: ns_name.clone(),
        reason,
    };

    let id = match namespace.labels().get(labels::TENANT) {
        None => return Err(integrity(format!("has no {} label", labels::TENANT))),
        Some(id) if id.is_empty() => {
            return Err(integrity(format!("has an empty {} label", labels::TENANT)))
        }
        Some(id) => id,
    };

    validate_tenant_id(id).map_err(|e| integrity(e.to_string()))?;

    if namespace_name(id) != ns_name {
        return Err(integrity(format!(
            "its {} label '{id}' does not match the namespace name",
            labels::TENANT
        )));
    }

    Ok(id.clone())
}
