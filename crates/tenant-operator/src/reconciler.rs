//! Reconcile loop
//!
//! One pass: resolve desired tenants, converge each one (namespace, then
//! Application), list tenants present in the cluster, and tear down the ones
//! no longer desired. Passes run one at a time on a fixed interval.

use std::collections::HashSet;
use std::time::Duration;

use tokio::select;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::controllers::application::ensure_application;
use crate::controllers::namespace::{ensure_namespace, list_managed_tenant_ids};
use crate::controllers::{EnsureOutcome, ReconcileContext};
use crate::error::ReconcileError;
use crate::tenant::{self, TenantSpec};

/// What a successful pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub desired: usize,
    pub created_namespaces: usize,
    pub updated_namespaces: usize,
    pub created_applications: usize,
    pub updated_applications: usize,
    pub deleted_tenants: usize,
}

impl PassReport {
    pub fn has_changes(&self) -> bool {
        self.created_namespaces
            + self.updated_namespaces
            + self.created_applications
            + self.updated_applications
            + self.deleted_tenants
            > 0
    }

    fn record_namespace(&mut self, outcome: EnsureOutcome) {
        match outcome {
            EnsureOutcome::Created => self.created_namespaces += 1,
            EnsureOutcome::Updated => self.updated_namespaces += 1,
            EnsureOutcome::Unchanged => {}
        }
    }

    fn record_application(&mut self, outcome: EnsureOutcome) {
        match outcome {
            EnsureOutcome::Created => self.created_applications += 1,
            EnsureOutcome::Updated => self.updated_applications += 1,
            EnsureOutcome::Unchanged => {}
        }
    }
}

/// Run one pass to completion
///
/// Stops at the first error; tenants after the failing one are picked up on
/// the next pass.
pub async fn reconcile_pass(ctx: &ReconcileContext) -> Result<PassReport, ReconcileError> {
    let desired = tenant::resolve(ctx.registry.as_ref()).await?;

    let mut report = PassReport {
        desired: desired.len(),
        ..Default::default()
    };

    for spec in &desired {
        let span = info_span!("tenant", tenant_id = %spec.id);
        converge_tenant(ctx, spec, &mut report)
            .instrument(span)
            .await?;
    }

    let desired_ids: HashSet<&str> = desired.iter().map(|t| t.id.as_str()).collect();
    let actual = list_managed_tenant_ids(ctx).await?;

    for tenant_id in actual.iter().filter(|id| !desired_ids.contains(id.as_str())) {
        let span = info_span!("tenant", tenant_id = %tenant_id);
        async {
            info!("Tenant no longer desired, deleting");
            ctx.deletion
                .delete_tenant(ctx.client.as_ref(), tenant_id)
                .await
        }
        .instrument(span)
        .await?;
        report.deleted_tenants += 1;
    }

    Ok(report)
}

async fn converge_tenant(
    ctx: &ReconcileContext,
    spec: &TenantSpec,
    report: &mut PassReport,
) -> Result<(), ReconcileError> {
    report.record_namespace(ensure_namespace(ctx, spec).await?);
    report.record_application(ensure_application(ctx, spec).await?);
    Ok(())
}

/// Run one pass, abandoning it as soon as `token` is cancelled
///
/// Dropping the pass future interrupts whichever API call or poll sleep it is
/// parked on.
pub async fn reconcile_once(
    ctx: &ReconcileContext,
    token: &CancellationToken,
) -> Result<PassReport, ReconcileError> {
    select! {
        biased;
        _ = token.cancelled() => Err(ReconcileError::Cancelled),
        result = reconcile_pass(ctx) => result,
    }
}

/// Reconcile every `period` until `token` is cancelled
///
/// The first pass starts immediately. A pass that overruns the period delays
/// the next tick instead of overlapping with it.
pub async fn run(ctx: &ReconcileContext, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = period.as_secs(), "Starting reconcile loop");

    loop {
        select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        debug!("Reconciling tenants");
        match reconcile_once(ctx, &token).await {
            Ok(report) if report.has_changes() => info!(
                desired = report.desired,
                created_namespaces = report.created_namespaces,
                updated_namespaces = report.updated_namespaces,
                created_applications = report.created_applications,
                updated_applications = report.updated_applications,
                deleted_tenants = report.deleted_tenants,
                "Reconcile pass complete"
            ),
            Ok(report) => debug!(desired = report.desired, "Reconcile pass complete, no changes"),
            Err(ReconcileError::Cancelled) => break,
            Err(e) => error!(error = %e, "Reconcile pass failed"),
        }
    }

    info!("Reconcile loop stopped");
}
