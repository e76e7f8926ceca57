//! Cluster API access
//!
//! Provides the small set of namespace and Application calls the reconciler
//! needs, behind a trait so the reconcile logic can run against mocks.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::application::Application;

/// Trait for cluster operations
///
/// `get_*` report absence as `Ok(None)`. Every other call reports a 404 as
/// [`ClusterError::NotFound`] so callers can decide whether absence is benign.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError>;

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError>;

    /// Full replace; the object must carry the resource version it was read with
    async fn replace_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError>;

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError>;

    /// List namespaces matching a label selector such as `is-tenant=true`
    async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<Namespace>, ClusterError>;

    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Application>, ClusterError>;

    async fn create_application(&self, app: &Application) -> Result<Application, ClusterError>;

    async fn replace_application(&self, app: &Application) -> Result<Application, ClusterError>;

    async fn delete_application(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),
    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    fn from_kube(kind: &'static str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref response) if response.code == 404 => ClusterError::NotFound {
                kind,
                name: name.to_string(),
            },
            other => ClusterError::Api(other),
        }
    }
}

/// Cluster client backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn applications(&self, namespace: &str) -> Api<Application> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn required_name<K: Resource>(obj: &K, kind: &str) -> Result<String, ClusterError> {
    obj.meta()
        .name
        .clone()
        .ok_or_else(|| ClusterError::InvalidObject(format!("{kind} has no metadata.name")))
}

fn required_namespace(app: &Application) -> Result<String, ClusterError> {
    app.namespace()
        .ok_or_else(|| ClusterError::InvalidObject("Application has no metadata.namespace".into()))
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    #[instrument(skip(self))]
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError> {
        self.namespaces()
            .get_opt(name)
            .await
            .map_err(|e| ClusterError::from_kube("Namespace", name, e))
    }

    #[instrument(skip(self, namespace), fields(name = ?namespace.metadata.name))]
    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        let name = required_name(namespace, "Namespace")?;
        let created = self
            .namespaces()
            .create(&PostParams::default(), namespace)
            .await
            .map_err(|e| ClusterError::from_kube("Namespace", &name, e))?;
        debug!(name = %name, "Created namespace");
        Ok(created)
    }

    #[instrument(skip(self, namespace), fields(name = ?namespace.metadata.name))]
    async fn replace_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        let name = required_name(namespace, "Namespace")?;
        let replaced = self
            .namespaces()
            .replace(&name, &PostParams::default(), namespace)
            .await
            .map_err(|e| ClusterError::from_kube("Namespace", &name, e))?;
        debug!(name = %name, "Replaced namespace");
        Ok(replaced)
    }

    #[instrument(skip(self))]
    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        self.namespaces()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| ClusterError::from_kube("Namespace", name, e))?;
        debug!(name = %name, "Deleted namespace");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<Namespace>, ClusterError> {
        let list = self
            .namespaces()
            .list(&ListParams::default().labels(label_selector))
            .await
            .map_err(ClusterError::Api)?;
        Ok(list.items)
    }

    #[instrument(skip(self))]
    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Application>, ClusterError> {
        self.applications(namespace)
            .get_opt(name)
            .await
            .map_err(|e| ClusterError::from_kube("Application", name, e))
    }

    #[instrument(skip(self, app), fields(name = ?app.metadata.name))]
    async fn create_application(&self, app: &Application) -> Result<Application, ClusterError> {
        let name = required_name(app, "Application")?;
        let namespace = required_namespace(app)?;
        let created = self
            .applications(&namespace)
            .create(&PostParams::default(), app)
            .await
            .map_err(|e| ClusterError::from_kube("Application", &name, e))?;
        debug!(name = %name, namespace = %namespace, "Created application");
        Ok(created)
    }

    #[instrument(skip(self, app), fields(name = ?app.metadata.name))]
    async fn replace_application(&self, app: &Application) -> Result<Application, ClusterError> {
        let name = required_name(app, "Application")?;
        let namespace = required_namespace(app)?;
        let replaced = self
            .applications(&namespace)
            .replace(&name, &PostParams::default(), app)
            .await
            .map_err(|e| ClusterError::from_kube("Application", &name, e))?;
        debug!(name = %name, namespace = %namespace, "Replaced application");
        Ok(replaced)
    }

    #[instrument(skip(self))]
    async fn delete_application(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.applications(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| ClusterError::from_kube("Application", name, e))?;
        debug!(name = %name, namespace = %namespace, "Deleted application");
        Ok(())
    }
}
