//! Reconcile pass errors

use std::time::Duration;

use thiserror::Error;

use crate::client::ClusterError;
use crate::tenant::ResolveError;

/// Why a reconcile pass stopped early
///
/// None of these end the process; the loop logs them and tries again on the
/// next tick.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Desired state could not be read or was malformed
    #[error("failed to resolve desired tenants: {0}")]
    Resolve(#[from] ResolveError),

    /// A managed namespace cannot be mapped back to a tenant
    #[error(
        "namespace {namespace} is marked as a tenant but {reason}; tenant deletions \
         are blocked until its tenant label is corrected or its is-tenant label \
         (or the namespace) is removed"
    )]
    Integrity { namespace: String, reason: String },

    #[error("{step} {name} failed: {source}")]
    Cluster {
        step: &'static str,
        name: String,
        #[source]
        source: ClusterError,
    },

    /// The Application outlived the deletion bound; the namespace was left alone
    #[error("timed out after {timeout:?} waiting for application {name} to be deleted")]
    Deadline { name: String, timeout: Duration },

    #[error("reconcile cancelled")]
    Cancelled,
}

impl ReconcileError {
    pub fn cluster(step: &'static str, name: impl Into<String>, source: ClusterError) -> Self {
        ReconcileError::Cluster {
            step,
            name: name.into(),
            source,
        }
    }
}
