//! PostgreSQL registry backend
//!
//! Reads the `tenants` table owned by the administrative API. The schema and
//! its migrations live with that service; this backend never writes and never
//! migrates. `values` is read as text so both `jsonb` and `text` columns work.
//!
//! # Connection Pooling
//!
//! Uses sqlx's PgPool with a deliberately small pool, since the operator
//! issues a single query per reconcile pass:
//! - min_connections: 0
//! - max_connections: 2
//! - acquire_timeout: 10s
//! - idle_timeout: 5min

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;

use crate::error::RegistryError;
use crate::traits::TenantRegistry;
use crate::types::TenantRecord;

/// PostgreSQL registry backend
#[derive(Debug)]
pub struct PostgresRegistry {
    pool: PgPool,
}

impl PostgresRegistry {
    /// Create a new PostgreSQL registry backend
    ///
    /// The pool connects lazily, so an unreachable database surfaces on the
    /// first query rather than at startup.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidConnectionString` if the URL is not a
    /// PostgreSQL URL or cannot be parsed by sqlx.
    pub fn new(url: &str) -> Result<Self, RegistryError> {
        if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
            return Err(RegistryError::InvalidConnectionString(
                "PostgreSQL URL must start with postgres:// or postgresql://".to_string(),
            ));
        }

        let pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .connect_lazy(url)
            .map_err(|e| RegistryError::InvalidConnectionString(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn row_to_record(row: &PgRow) -> Result<TenantRecord, RegistryError> {
    let decode = |e: sqlx::Error| RegistryError::InvalidData(format!("bad tenant row: {e}"));

    let values: Option<String> = row.try_get("values").map_err(decode)?;
    let target_revision: Option<String> = row.try_get("target_revision").map_err(decode)?;

    Ok(TenantRecord {
        id: row.try_get("id").map_err(decode)?,
        repo_url: row.try_get("repo_url").map_err(decode)?,
        path: row.try_get("path").map_err(decode)?,
        target_revision: target_revision.filter(|r| !r.is_empty()),
        values: values.map(String::into_bytes).unwrap_or_default(),
    })
}

#[async_trait]
impl TenantRegistry for PostgresRegistry {
    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, RegistryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, repo_url, path, target_revision, "values"::text AS "values"
            FROM tenants
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RegistryError::query("list_tenants failed", e))?;

        let records = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = records.len(), "Loaded tenant records from PostgreSQL");
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), RegistryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RegistryError::connection("health check failed", e))?;
        Ok(())
    }
}
