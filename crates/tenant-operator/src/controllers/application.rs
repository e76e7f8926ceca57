//! Tenant Application reconciler

use tracing::{debug, info, instrument};

use super::{EnsureOutcome, ReconcileContext};
use crate::application::build_application;
use crate::error::ReconcileError;
use crate::tenant::TenantSpec;

/// Ensure the tenant's Application exists with the derived spec
///
/// Only `spec` is compared. On drift the live object keeps its metadata and
/// status and gets the desired spec swapped in.
#[instrument(skip(ctx, tenant), fields(application = %tenant.namespace_name()))]
pub async fn ensure_application(
    ctx: &ReconcileContext,
    tenant: &TenantSpec,
) -> Result<EnsureOutcome, ReconcileError> {
    let desired = build_application(tenant, &ctx.gitops_namespace);
    let name = tenant.namespace_name();

    let existing = ctx
        .client
        .get_application(&ctx.gitops_namespace, &name)
        .await
        .map_err(|e| ReconcileError::cluster("get application", &name, e))?;

    let Some(mut live) = existing else {
        ctx.client
            .create_application(&desired)
            .await
            .map_err(|e| ReconcileError::cluster("create application", &name, e))?;
        info!(application = %name, "Created tenant application");
        return Ok(EnsureOutcome::Created);
    };

    if live.spec == desired.spec {
        debug!(application = %name, "Application spec up to date");
        return Ok(EnsureOutcome::Unchanged);
    }

    live.spec = desired.spec;
    ctx.client
        .replace_application(&live)
        .await
        .map_err(|e| ReconcileError::cluster("update application", &name, e))?;
    info!(application = %name, "Updated drifted tenant application");
    Ok(EnsureOutcome::Updated)
}
