//! Registry error types

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error for wrapping backend-specific errors
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Tenant registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registry source could not be read
    #[error("failed to read registry at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection failure
    #[error("connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// Query execution failure
    #[error("query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// Invalid connection string
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Stored data could not be decoded
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl RegistryError {
    /// Create a connection error with source
    pub fn connection(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error with source
    pub fn query(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Query {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
