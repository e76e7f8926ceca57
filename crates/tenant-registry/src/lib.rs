//! Tenant registry access for the tenant operator
//!
//! The registry is the authoritative record of desired tenants. It is written
//! by the administrative API; this crate only reads it.
//!
//! # Supported Backends
//!
//! - **File** (always available) - YAML sequence of tenant records
//! - **PostgreSQL** (feature: `postgres`) - the `tenants` table
//!
//! # Examples
//!
//! ```no_run
//! use tenant_registry::{create_registry, RegistryConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RegistryConfig::from_url("file:///data/tenants")?;
//! let registry = create_registry(&config)?;
//! let tenants = registry.list_tenants().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod traits;
mod types;

pub mod backends;

pub use config::{BackendType, ConfigError, RegistryConfig};
pub use error::RegistryError;
pub use traits::TenantRegistry;
pub use types::TenantRecord;

/// Create a registry from configuration
///
/// # Errors
///
/// Returns `RegistryError::InvalidConnectionString` if the backend is not
/// compiled in (missing feature flag) or the connection string is invalid.
pub fn create_registry(
    config: &RegistryConfig,
) -> Result<std::sync::Arc<dyn TenantRegistry>, RegistryError> {
    let registry: std::sync::Arc<dyn TenantRegistry> = match config.backend {
        BackendType::File => std::sync::Arc::new(backends::file::FileRegistry::new(
            &config.connection_string,
        )),
        #[cfg(feature = "postgres")]
        BackendType::Postgres => std::sync::Arc::new(
            backends::postgres::PostgresRegistry::new(&config.connection_string)?,
        ),
        #[cfg(not(feature = "postgres"))]
        BackendType::Postgres => {
            return Err(RegistryError::InvalidConnectionString(
                "PostgreSQL backend not compiled in (enable 'postgres' feature)".into(),
            ))
        }
    };

    Ok(registry)
}
