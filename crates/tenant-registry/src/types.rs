//! Domain types for the registry layer

use serde::{Deserialize, Serialize};

/// A tenant as persisted in the registry
///
/// `values` holds the raw stored values document. It is decoded by the
/// reconciler, not here, so a malformed document surfaces at resolve time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub id: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub target_revision: Option<String>,
    /// Raw JSON bytes, possibly empty
    #[serde(default)]
    pub values: Vec<u8>,
}

impl TenantRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repo_url: String::new(),
            path: String::new(),
            target_revision: None,
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, repo_url: &str, path: &str) -> Self {
        self.repo_url = repo_url.to_string();
        self.path = path.to_string();
        self
    }

    #[must_use]
    pub fn with_target_revision(mut self, revision: &str) -> Self {
        self.target_revision = Some(revision.to_string());
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: impl Into<Vec<u8>>) -> Self {
        self.values = values.into();
        self
    }
}
