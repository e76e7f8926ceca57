//! Tenant id validation
//!
//! A tenant id becomes part of a namespace name and a label value, so it has
//! to satisfy both: a lowercase RFC 1123 label that still fits once prefixed.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::config::NAMESPACE_PREFIX;

/// Kubernetes limit for namespace names and label values
pub const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tenant id cannot be empty")]
    Empty,

    #[error("tenant id '{0}' is not a lowercase RFC 1123 label")]
    InvalidLabel(String),

    #[error("tenant id '{id}' is too long: namespace name would be {len} characters (max 63)")]
    TooLong { id: String, len: usize },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

// RFC 1123 label: lowercase alphanumeric and hyphens, no leading/trailing hyphen
static LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap());

/// Validates a tenant id
///
/// Rules:
/// - Non-empty
/// - Lowercase alphanumeric and hyphens, starting and ending with an alphanumeric
/// - `NAMESPACE_PREFIX + id` is at most 63 characters
pub fn validate_tenant_id(id: &str) -> ValidationResult<&str> {
    if id.is_empty() {
        return Err(ValidationError::Empty);
    }

    let len = NAMESPACE_PREFIX.len() + id.len();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            id: id.to_string(),
            len,
        });
    }

    if !LABEL_REGEX.is_match(id) {
        return Err(ValidationError::InvalidLabel(id.to_string()));
    }

    Ok(id)
}
