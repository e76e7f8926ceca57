//! Registry backend implementations
//!
//! The file backend is always available. PostgreSQL is behind the `postgres`
//! feature flag.

pub mod file;

#[cfg(feature = "postgres")]
pub mod postgres;
