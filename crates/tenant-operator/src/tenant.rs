//! Desired tenant state
//!
//! [`resolve`] turns the registry listing into the set of [`TenantSpec`]s a
//! reconcile pass converges toward. Any bad record fails the whole listing:
//! a partial desired set would make the deletion step remove live tenants.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use thiserror::Error;
use tenant_registry::{RegistryError, TenantRecord, TenantRegistry};
use tracing::{debug, instrument};

use crate::config::NAMESPACE_PREFIX;
use crate::validation::{validate_tenant_id, ValidationError};

/// Structured Helm values, ordered by key
pub type HelmValues = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to read tenant registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("invalid tenant id: {0}")]
    InvalidId(#[from] ValidationError),

    #[error("tenant {tenant_id}: malformed values document: {reason}")]
    InvalidValues { tenant_id: String, reason: String },

    #[error("duplicate tenant id {0}")]
    DuplicateId(String),
}

/// Desired state for one tenant
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSpec {
    pub id: String,
    /// Empty means the default repository
    pub repo_url: String,
    /// Empty means the default path
    pub path: String,
    pub target_revision: Option<String>,
    pub helm_values: Option<HelmValues>,
}

impl TenantSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repo_url: String::new(),
            path: String::new(),
            target_revision: None,
            helm_values: None,
        }
    }

    /// Name of the tenant namespace, also used for its Application
    pub fn namespace_name(&self) -> String {
        namespace_name(&self.id)
    }
}

/// Namespace name for a tenant id
pub fn namespace_name(tenant_id: &str) -> String {
    format!("{NAMESPACE_PREFIX}{tenant_id}")
}

impl TryFrom<TenantRecord> for TenantSpec {
    type Error = ResolveError;

    fn try_from(record: TenantRecord) -> Result<Self, Self::Error> {
        validate_tenant_id(&record.id)?;
        let helm_values = decode_values(&record.id, &record.values)?;

        Ok(Self {
            id: record.id,
            repo_url: record.repo_url,
            path: record.path,
            target_revision: record.target_revision.filter(|r| !r.is_empty()),
            helm_values,
        })
    }
}

fn decode_values(tenant_id: &str, raw: &[u8]) -> Result<Option<HelmValues>, ResolveError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let invalid = |reason: String| ResolveError::InvalidValues {
        tenant_id: tenant_id.to_string(),
        reason,
    };

    match serde_json::from_slice::<Value>(raw).map_err(|e| invalid(e.to_string()))? {
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) => Ok(Some(map.into_iter().collect())),
        Value::Null => Ok(None),
        other => Err(invalid(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read the registry and build the desired tenant set
///
/// # Errors
///
/// Fails on the first unreadable, malformed or duplicate record.
#[instrument(skip(registry))]
pub async fn resolve(registry: &dyn TenantRegistry) -> Result<Vec<TenantSpec>, ResolveError> {
    let records = registry.list_tenants().await?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut specs = Vec::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.clone()) {
            return Err(ResolveError::DuplicateId(record.id));
        }
        specs.push(TenantSpec::try_from(record)?);
    }

    debug!(count = specs.len(), "Resolved desired tenants");
    Ok(specs)
}
