//! Registry trait definitions

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::types::TenantRecord;

/// Read side of the tenant registry
///
/// The registry is written by the administrative API. The operator only
/// ever lists it, once per reconcile pass.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// List every stored tenant, ordered by id
    ///
    /// Each call reads the backing store fresh; nothing is cached between
    /// calls.
    ///
    /// # Errors
    /// * `RegistryError::Io` / `RegistryError::Connection` - Store unreachable
    /// * `RegistryError::Query` - Query failed
    /// * `RegistryError::InvalidData` - Stored records could not be decoded
    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, RegistryError>;

    /// Check that the backend is reachable
    ///
    /// # Errors
    /// * `RegistryError::Io` / `RegistryError::Connection` - Backend unreachable
    async fn health_check(&self) -> Result<(), RegistryError>;
}
