//! Operator configuration and fixed naming constants

use std::time::Duration;

use anyhow::{ensure, Result};
use tracing::warn;

/// Namespace name prefix for tenant namespaces and Applications
pub const NAMESPACE_PREFIX: &str = "acs-";

/// Labels written on managed namespaces and Applications
pub mod labels {
    /// Marker label, always "true" on managed objects
    pub const IS_TENANT: &str = "is-tenant";
    /// Holds the tenant id; the only way back from namespace to tenant
    pub const TENANT: &str = "tenant";
    /// Names the GitOps controller instance allowed to deploy into the namespace
    pub const MANAGED_BY: &str = "argocd.argoproj.io/managed-by";
    /// Label selector matching every managed namespace
    pub const IS_TENANT_SELECTOR: &str = "is-tenant=true";
}

/// Fallback values for the generated Application spec
pub mod defaults {
    pub const REPO_URL: &str = "https://github.com/ludydoo/poc-cloud-service-manifests";
    pub const PATH: &str = "tenant-manifests";
    pub const TARGET_REVISION: &str = "HEAD";
    pub const PROJECT: &str = "default";
    /// In-cluster API endpoint as seen by the GitOps controller
    pub const DESTINATION_SERVER: &str = "https://kubernetes.default.svc";

    pub const REGISTRY_URL: &str = "file:///data/tenants";
    pub const GITOPS_NAMESPACE: &str = "openshift-gitops";
    pub const GITOPS_MANAGED_BY: &str = "openshift-gitops";
    pub const HEALTH_PORT: u16 = 8081;

    pub const RECONCILE_INTERVAL_SECS: u64 = 5;
    pub const DELETION_TIMEOUT_SECS: u64 = 300;
    pub const DELETION_POLL_INTERVAL_SECS: u64 = 5;
}

/// Runtime configuration for the operator.
///
/// Fields are private to enforce invariants. Use [`OperatorConfig::from_env()`]
/// or [`OperatorConfig::new()`] for validated construction.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    registry_url: String,
    gitops_namespace: String,
    gitops_managed_by: String,
    reconcile_interval: Duration,
    deletion_timeout: Duration,
    deletion_poll_interval: Duration,
    health_port: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            registry_url: defaults::REGISTRY_URL.to_string(),
            gitops_namespace: defaults::GITOPS_NAMESPACE.to_string(),
            gitops_managed_by: defaults::GITOPS_MANAGED_BY.to_string(),
            reconcile_interval: Duration::from_secs(defaults::RECONCILE_INTERVAL_SECS),
            deletion_timeout: Duration::from_secs(defaults::DELETION_TIMEOUT_SECS),
            deletion_poll_interval: Duration::from_secs(defaults::DELETION_POLL_INTERVAL_SECS),
            health_port: defaults::HEALTH_PORT,
        }
    }
}

impl OperatorConfig {
    /// Create a configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `registry_url`, `gitops_namespace` or `gitops_managed_by` is empty
    /// - any interval is zero
    /// - `deletion_poll_interval >= deletion_timeout` (the wait could never poll)
    pub fn new(
        registry_url: String,
        gitops_namespace: String,
        gitops_managed_by: String,
        reconcile_interval: Duration,
        deletion_timeout: Duration,
        deletion_poll_interval: Duration,
        health_port: u16,
    ) -> Result<Self> {
        ensure!(!registry_url.is_empty(), "registry_url cannot be empty");
        ensure!(
            !gitops_namespace.is_empty(),
            "gitops_namespace cannot be empty"
        );
        ensure!(
            !gitops_managed_by.is_empty(),
            "gitops_managed_by cannot be empty"
        );
        ensure!(
            !reconcile_interval.is_zero(),
            "reconcile_interval must be greater than zero"
        );
        ensure!(
            !deletion_poll_interval.is_zero(),
            "deletion_poll_interval must be greater than zero"
        );
        ensure!(
            deletion_poll_interval < deletion_timeout,
            "deletion_poll_interval ({:?}) must be less than deletion_timeout ({:?})",
            deletion_poll_interval,
            deletion_timeout
        );

        Ok(Self {
            registry_url,
            gitops_namespace,
            gitops_managed_by,
            reconcile_interval,
            deletion_timeout,
            deletion_poll_interval,
            health_port,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TENANT_REGISTRY_URL`: registry location (default: `file:///data/tenants`)
    /// - `GITOPS_NAMESPACE`: namespace holding Applications (default: `openshift-gitops`)
    /// - `GITOPS_MANAGED_BY`: value of the managed-by namespace label (default: `openshift-gitops`)
    /// - `RECONCILE_INTERVAL_SECS`: tick period (default: 5)
    /// - `DELETION_TIMEOUT_SECS`: bound on waiting for an Application to go away (default: 300)
    /// - `DELETION_POLL_INTERVAL_SECS`: poll period during that wait (default: 5)
    /// - `HEALTH_PORT`: health probe port (default: 8081)
    pub fn from_env() -> Result<Self> {
        let registry_url = string_env("TENANT_REGISTRY_URL", defaults::REGISTRY_URL);
        let gitops_namespace = string_env("GITOPS_NAMESPACE", defaults::GITOPS_NAMESPACE);
        let gitops_managed_by = string_env("GITOPS_MANAGED_BY", defaults::GITOPS_MANAGED_BY);

        let reconcile_interval = parse_duration_env(
            "RECONCILE_INTERVAL_SECS",
            Duration::from_secs(defaults::RECONCILE_INTERVAL_SECS),
        );
        let deletion_timeout = parse_duration_env(
            "DELETION_TIMEOUT_SECS",
            Duration::from_secs(defaults::DELETION_TIMEOUT_SECS),
        );
        let deletion_poll_interval = parse_duration_env(
            "DELETION_POLL_INTERVAL_SECS",
            Duration::from_secs(defaults::DELETION_POLL_INTERVAL_SECS),
        );

        let health_port = match std::env::var("HEALTH_PORT") {
            Ok(v) => v.parse::<u16>().unwrap_or_else(|e| {
                warn!(
                    env_var = "HEALTH_PORT",
                    value = %v,
                    error = %e,
                    default = defaults::HEALTH_PORT,
                    "Failed to parse port env var, using default"
                );
                defaults::HEALTH_PORT
            }),
            Err(_) => defaults::HEALTH_PORT,
        };

        Self::new(
            registry_url,
            gitops_namespace,
            gitops_managed_by,
            reconcile_interval,
            deletion_timeout,
            deletion_poll_interval,
            health_port,
        )
    }

    /// Registry location URL.
    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Namespace where Application resources live.
    pub fn gitops_namespace(&self) -> &str {
        &self.gitops_namespace
    }

    /// Value written to the managed-by label on tenant namespaces.
    pub fn gitops_managed_by(&self) -> &str {
        &self.gitops_managed_by
    }

    /// Period between reconcile passes.
    pub fn reconcile_interval(&self) -> Duration {
        self.reconcile_interval
    }

    /// Upper bound on waiting for an Application to disappear.
    pub fn deletion_timeout(&self) -> Duration {
        self.deletion_timeout
    }

    /// Poll period while waiting for an Application to disappear.
    pub fn deletion_poll_interval(&self) -> Duration {
        self.deletion_poll_interval
    }

    /// Health probe server port.
    pub fn health_port(&self) -> u16 {
        self.health_port
    }
}

fn string_env(var_name: &str, default: &str) -> String {
    std::env::var(var_name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse a duration in seconds from an environment variable with logging on failure.
fn parse_duration_env(var_name: &str, default: Duration) -> Duration {
    match std::env::var(var_name) {
        Ok(v) => match v.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(e) => {
                warn!(
                    env_var = var_name,
                    value = %v,
                    error = %e,
                    default_secs = default.as_secs(),
                    "Failed to parse duration env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}
