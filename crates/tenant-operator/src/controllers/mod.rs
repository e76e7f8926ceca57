//! Per-tenant reconcilers for the two managed resource kinds

pub mod application;
pub mod namespace;

use std::sync::Arc;

use tenant_registry::TenantRegistry;

use crate::client::ClusterClient;
use crate::config::OperatorConfig;
use crate::deletion::DeletionSequencer;

/// What an ensure call did to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Shared state for a reconcile pass
pub struct ReconcileContext {
    /// Cluster API client
    pub client: Arc<dyn ClusterClient>,
    /// Source of desired tenants
    pub registry: Arc<dyn TenantRegistry>,
    /// Application removal ahead of namespace removal
    pub deletion: DeletionSequencer,
    /// Namespace holding the Application resources
    pub gitops_namespace: String,
    /// Value of the managed-by label on tenant namespaces
    pub gitops_managed_by: String,
}

impl ReconcileContext {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        registry: Arc<dyn TenantRegistry>,
        config: &OperatorConfig,
    ) -> Self {
        Self {
            client,
            registry,
            deletion: DeletionSequencer::new(
                config.gitops_namespace(),
                config.deletion_timeout(),
                config.deletion_poll_interval(),
            ),
            gitops_namespace: config.gitops_namespace().to_string(),
            gitops_managed_by: config.gitops_managed_by().to_string(),
        }
    }
}
