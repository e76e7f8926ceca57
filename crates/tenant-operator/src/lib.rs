//! tenant-operator: keeps tenant namespaces and GitOps Applications in step
//! with the tenant registry

pub mod application;
pub mod client;
pub mod config;
pub mod controllers;
pub mod deletion;
pub mod error;
pub mod health;
pub mod reconciler;
pub mod tenant;
pub mod validation;

pub use application::Application;
pub use config::OperatorConfig;
pub use error::ReconcileError;
pub use tenant::TenantSpec;
