//! YAML file registry backend
//!
//! The file holds a sequence of tenant records:
//!
//! ```yaml
//! - id: team-a
//!   repoUrl: https://github.com/example/manifests
//!   path: charts/app
//!   targetRevision: main
//!   values:
//!     replicas: 2
//! - id: team-b
//! ```
//!
//! `values` may also be a JSON string, which is passed through untouched.
//! The file is re-read on every call so edits are picked up on the next pass.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::RegistryError;
use crate::traits::TenantRegistry;
use crate::types::TenantRecord;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRecord {
    id: String,
    #[serde(default)]
    repo_url: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    target_revision: Option<String>,
    #[serde(default)]
    values: Option<serde_yaml::Value>,
}

impl FileRecord {
    fn into_record(self) -> Result<TenantRecord, RegistryError> {
        let values = match self.values {
            None | Some(serde_yaml::Value::Null) => Vec::new(),
            Some(serde_yaml::Value::String(raw)) => raw.into_bytes(),
            Some(other) => serde_json::to_vec(&other).map_err(|e| {
                RegistryError::InvalidData(format!(
                    "values for tenant {} cannot be encoded as JSON: {e}",
                    self.id
                ))
            })?,
        };

        Ok(TenantRecord {
            id: self.id,
            repo_url: self.repo_url,
            path: self.path,
            target_revision: self.target_revision.filter(|r| !r.is_empty()),
            values,
        })
    }
}

/// Registry backed by a YAML file
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn parse(contents: &str) -> Result<Vec<TenantRecord>, RegistryError> {
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let raw: Option<Vec<FileRecord>> = serde_yaml::from_str(contents)
            .map_err(|e| RegistryError::InvalidData(format!("malformed tenant file: {e}")))?;

        let mut records = raw
            .unwrap_or_default()
            .into_iter()
            .map(FileRecord::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

#[async_trait]
impl TenantRegistry for FileRegistry {
    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, RegistryError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        let records = Self::parse(&contents)?;
        debug!(
            path = %self.path.display(),
            count = records.len(),
            "Loaded tenant records from file"
        );
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), RegistryError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| self.io_error(e))
    }
}
