//! Ordered tenant teardown
//!
//! The Application goes first and must be confirmed gone before the namespace
//! is deleted. The GitOps controller keeps syncing an Application into its
//! namespace until the Application itself is removed.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument};

use crate::client::ClusterClient;
use crate::error::ReconcileError;
use crate::tenant::namespace_name;

/// Deletes a tenant's Application, waits for it, then deletes the namespace
#[derive(Debug, Clone)]
pub struct DeletionSequencer {
    gitops_namespace: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl DeletionSequencer {
    pub fn new(gitops_namespace: &str, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            gitops_namespace: gitops_namespace.to_string(),
            timeout,
            poll_interval,
        }
    }

    /// Tear down everything the operator created for `tenant_id`
    ///
    /// # Errors
    ///
    /// - `ReconcileError::Cluster` on any API failure other than not-found
    /// - `ReconcileError::Deadline` if the Application is still present after
    ///   the timeout; the namespace is then left in place
    #[instrument(skip(self, client))]
    pub async fn delete_tenant(
        &self,
        client: &dyn ClusterClient,
        tenant_id: &str,
    ) -> Result<(), ReconcileError> {
        let name = namespace_name(tenant_id);

        self.delete_application(client, &name).await?;

        match client.delete_namespace(&name).await {
            Ok(()) => info!(namespace = %name, "Deleted tenant namespace"),
            Err(e) if e.is_not_found() => {
                debug!(namespace = %name, "Namespace already deleted");
            }
            Err(e) => return Err(ReconcileError::cluster("delete namespace", &name, e)),
        }

        Ok(())
    }

    async fn delete_application(
        &self,
        client: &dyn ClusterClient,
        name: &str,
    ) -> Result<(), ReconcileError> {
        let existing = client
            .get_application(&self.gitops_namespace, name)
            .await
            .map_err(|e| ReconcileError::cluster("get application", name, e))?;

        let Some(app) = existing else {
            debug!(application = %name, "Application already deleted");
            return Ok(());
        };

        if app.metadata.deletion_timestamp.is_none() {
            match client.delete_application(&self.gitops_namespace, name).await {
                Ok(()) => info!(application = %name, "Requested application deletion"),
                Err(e) if e.is_not_found() => {
                    debug!(application = %name, "Application already deleted");
                    return Ok(());
                }
                Err(e) => return Err(ReconcileError::cluster("delete application", name, e)),
            }
        } else {
            debug!(application = %name, "Application deletion already in progress");
        }

        self.wait_for_application_gone(client, name).await
    }

    /// Poll until the Application is gone or the timeout passes
    async fn wait_for_application_gone(
        &self,
        client: &dyn ClusterClient,
        name: &str,
    ) -> Result<(), ReconcileError> {
        let poll = async {
            loop {
                let present = client
                    .get_application(&self.gitops_namespace, name)
                    .await
                    .map_err(|e| ReconcileError::cluster("get application", name, e))?;

                if present.is_none() {
                    info!(application = %name, "Application deleted");
                    return Ok(());
                }

                debug!(
                    application = %name,
                    poll_secs = self.poll_interval.as_secs(),
                    "Waiting for application finalizers"
                );
                sleep(self.poll_interval).await;
            }
        };

        match timeout(self.timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(ReconcileError::Deadline {
                name: name.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use mockall::Sequence;

    use crate::application::{build_application, Application};
    use crate::client::{ClusterError, MockClusterClient};
    use crate::tenant::TenantSpec;

    fn sequencer() -> DeletionSequencer {
        DeletionSequencer::new(
            "openshift-gitops",
            Duration::from_secs(300),
            Duration::from_secs(5),
        )
    }

    fn application(deleting: bool) -> Application {
        let mut app = build_application(&TenantSpec::new("a"), "openshift-gitops");
        if deleting {
            app.metadata.deletion_timestamp = Some(Time(Default::default()));
        }
        app
    }

    fn not_found(kind: &'static str) -> ClusterError {
        ClusterError::NotFound {
            kind,
            name: "acs-a".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_application_deletes_namespace() {
        let mut client = MockClusterClient::new();
        client.expect_get_application().times(1).returning(|_, _| Ok(None));
        client.expect_delete_application().never();
        client
            .expect_delete_namespace()
            .withf(|name| name == "acs-a")
            .times(1)
            .returning(|_| Ok(()));

        sequencer().delete_tenant(&client, "a").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletes_application_before_namespace() {
        let mut seq = Sequence::new();
        let mut client = MockClusterClient::new();
        client
            .expect_get_application()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(application(false))));
        client
            .expect_delete_application()
            .withf(|ns, name| ns == "openshift-gitops" && name == "acs-a")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        client
            .expect_get_application()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        client
            .expect_delete_namespace()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        sequencer().delete_tenant(&client, "a").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_while_deletion_in_progress() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let mut client = MockClusterClient::new();
        // Present for the first three reads, gone afterwards
        client.expect_get_application().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                Ok(Some(application(true)))
            } else {
                Ok(None)
            }
        });
        client.expect_delete_application().never();
        client.expect_delete_namespace().times(1).returning(|_| Ok(()));

        let start = tokio::time::Instant::now();
        sequencer().delete_tenant(&client, "a").await.unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_namespace() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_application()
            .returning(|_, _| Ok(Some(application(true))));
        client.expect_delete_namespace().never();

        let err = sequencer().delete_tenant(&client, "a").await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Deadline { ref name, timeout } if name == "acs-a" && timeout == Duration::from_secs(300)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_is_fatal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut client = MockClusterClient::new();
        client.expect_get_application().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Some(application(true)))
            } else {
                Err(ClusterError::InvalidObject("boom".to_string()))
            }
        });
        client.expect_delete_namespace().never();

        let err = sequencer().delete_tenant(&client, "a").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Cluster { step: "get application", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_deletes_are_benign() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_application()
            .times(1)
            .returning(|_, _| Ok(Some(application(false))));
        client
            .expect_delete_application()
            .times(1)
            .returning(|_, _| Err(not_found("Application")));
        client
            .expect_delete_namespace()
            .times(1)
            .returning(|_| Err(not_found("Namespace")));

        sequencer().delete_tenant(&client, "a").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_namespace_delete_error_propagates() {
        let mut client = MockClusterClient::new();
        client.expect_get_application().returning(|_, _| Ok(None));
        client
            .expect_delete_namespace()
            .returning(|_| Err(ClusterError::InvalidObject("forbidden".to_string())));

        let err = sequencer().delete_tenant(&client, "a").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Cluster { step: "delete namespace", .. }));
    }
}
