//! Shared fixtures for reconcile integration tests
//!
//! `FakeCluster` is an in-memory stand-in for the API server that records
//! every call, so tests can assert both the final state and which writes
//! were issued to get there.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::ErrorResponse;
use kube::ResourceExt;
use tempfile::TempDir;

use tenant_operator::client::{ClusterClient, ClusterError};
use tenant_operator::config::OperatorConfig;
use tenant_operator::controllers::ReconcileContext;
use tenant_operator::Application;
use tenant_registry::backends::file::FileRegistry;

pub const GITOPS_NAMESPACE: &str = "openshift-gitops";

/// How long an Application lingers after deletion is requested
#[derive(Debug, Clone, Copy)]
pub enum Finalizer {
    /// Gone after this many further reads
    After(usize),
    /// Never goes away
    Stuck,
}

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, Namespace>,
    applications: BTreeMap<String, Application>,
    finalizers: HashMap<String, Finalizer>,
    next_version: u64,
    log: Vec<String>,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

fn conflict(name: &str) -> ClusterError {
    ClusterError::Api(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{name} already exists"),
        reason: "AlreadyExists".to_string(),
        code: 409,
    }))
}

fn not_found(kind: &'static str, name: &str) -> ClusterError {
    ClusterError::NotFound {
        kind,
        name: name.to_string(),
    }
}

fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector.split(',').all(|term| match term.split_once('=') {
        Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
        None => labels.contains_key(term),
    })
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a namespace directly, bypassing the call log
    pub fn insert_namespace(&self, name: &str, labels: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        let namespace = Namespace {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                resource_version: Some(version),
                ..Default::default()
            },
            ..Default::default()
        };
        state.namespaces.insert(name.to_string(), namespace);
    }

    /// Seed an Application directly, bypassing the call log
    pub fn insert_application(&self, mut app: Application) {
        let mut state = self.state.lock().unwrap();
        app.metadata.resource_version = Some(state.bump());
        state.applications.insert(app.name_any(), app);
    }

    /// Make deletion of `name` wait on a finalizer
    pub fn set_finalizer(&self, name: &str, finalizer: Finalizer) {
        self.state
            .lock()
            .unwrap()
            .finalizers
            .insert(name.to_string(), finalizer);
    }

    /// Mark an Application as already being deleted
    pub fn mark_deleting(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(app) = state.applications.get_mut(name) {
            app.metadata.deletion_timestamp = Some(Time(Default::default()));
        }
    }

    /// Mutate an Application out of band
    pub fn edit_application(&self, name: &str, edit: impl FnOnce(&mut Application)) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        if let Some(app) = state.applications.get_mut(name) {
            edit(app);
            app.metadata.resource_version = Some(version);
        }
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.state.lock().unwrap().namespaces.get(name).cloned()
    }

    pub fn application(&self, name: &str) -> Option<Application> {
        self.state.lock().unwrap().applications.get(name).cloned()
    }

    pub fn namespace_names(&self) -> Vec<String> {
        self.state.lock().unwrap().namespaces.keys().cloned().collect()
    }

    pub fn application_names(&self) -> Vec<String> {
        self.state.lock().unwrap().applications.keys().cloned().collect()
    }

    /// Every recorded call as `"<operation> <name>"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Recorded create, replace and delete calls
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("get_") && !c.starts_with("list_"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().log.clear();
    }

    fn record(&self, state: &mut State, op: &str, name: &str) {
        state.log.push(format!("{op} {name}"));
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ClusterError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "get_namespace", name);
        Ok(state.namespaces.get(name).cloned())
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        let name = namespace.name_any();
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "create_namespace", &name);
        if state.namespaces.contains_key(&name) {
            return Err(conflict(&name));
        }
        let mut stored = namespace.clone();
        stored.metadata.resource_version = Some(state.bump());
        state.namespaces.insert(name, stored.clone());
        Ok(stored)
    }

    async fn replace_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        let name = namespace.name_any();
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "replace_namespace", &name);
        if !state.namespaces.contains_key(&name) {
            return Err(not_found("Namespace", &name));
        }
        let mut stored = namespace.clone();
        stored.metadata.resource_version = Some(state.bump());
        state.namespaces.insert(name, stored.clone());
        Ok(stored)
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "delete_namespace", name);
        state
            .namespaces
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("Namespace", name))
    }

    async fn list_namespaces(&self, label_selector: &str) -> Result<Vec<Namespace>, ClusterError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "list_namespaces", label_selector);
        Ok(state
            .namespaces
            .values()
            .filter(|ns| matches_selector(ns.labels(), label_selector))
            .cloned()
            .collect())
    }

    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Application>, ClusterError> {
        assert_eq!(namespace, GITOPS_NAMESPACE);
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "get_application", name);

        let deleting = state
            .applications
            .get(name)
            .is_some_and(|app| app.metadata.deletion_timestamp.is_some());
        if deleting {
            match state.finalizers.get(name).copied() {
                Some(Finalizer::After(0)) | None => {
                    state.applications.remove(name);
                    state.finalizers.remove(name);
                }
                Some(Finalizer::After(n)) => {
                    state
                        .finalizers
                        .insert(name.to_string(), Finalizer::After(n - 1));
                }
                Some(Finalizer::Stuck) => {}
            }
        }

        Ok(state.applications.get(name).cloned())
    }

    async fn create_application(&self, app: &Application) -> Result<Application, ClusterError> {
        assert_eq!(app.namespace().as_deref(), Some(GITOPS_NAMESPACE));
        let name = app.name_any();
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "create_application", &name);
        if state.applications.contains_key(&name) {
            return Err(conflict(&name));
        }
        let mut stored = app.clone();
        stored.metadata.resource_version = Some(state.bump());
        state.applications.insert(name, stored.clone());
        Ok(stored)
    }

    async fn replace_application(&self, app: &Application) -> Result<Application, ClusterError> {
        let name = app.name_any();
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "replace_application", &name);
        if !state.applications.contains_key(&name) {
            return Err(not_found("Application", &name));
        }
        let mut stored = app.clone();
        stored.metadata.resource_version = Some(state.bump());
        state.applications.insert(name, stored.clone());
        Ok(stored)
    }

    async fn delete_application(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        assert_eq!(namespace, GITOPS_NAMESPACE);
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "delete_application", name);
        if !state.applications.contains_key(name) {
            return Err(not_found("Application", name));
        }
        if state.finalizers.contains_key(name) {
            if let Some(app) = state.applications.get_mut(name) {
                app.metadata.deletion_timestamp = Some(Time(Default::default()));
            }
        } else {
            state.applications.remove(name);
        }
        Ok(())
    }
}

/// Tenant registry file in a temporary directory
pub struct RegistryFile {
    _dir: TempDir,
    path: PathBuf,
}

impl RegistryFile {
    pub fn new(yaml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tenants.yaml");
        std::fs::write(&path, yaml).unwrap();
        Self { _dir: dir, path }
    }

    pub fn write(&self, yaml: &str) {
        std::fs::write(&self.path, yaml).unwrap();
    }

    pub fn registry(&self) -> Arc<FileRegistry> {
        Arc::new(FileRegistry::new(&self.path))
    }
}

pub fn test_config() -> OperatorConfig {
    OperatorConfig::new(
        "file:///unused".to_string(),
        GITOPS_NAMESPACE.to_string(),
        "openshift-gitops".to_string(),
        Duration::from_secs(5),
        Duration::from_secs(300),
        Duration::from_secs(5),
        8081,
    )
    .unwrap()
}

pub fn make_context(cluster: &Arc<FakeCluster>, registry: &RegistryFile) -> ReconcileContext {
    ReconcileContext::new(cluster.clone(), registry.registry(), &test_config())
}
