//! Custom error types for nodevault
//!
//! This module defines the error hierarchy for the archive engine using
//! thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for nodevault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Filesystem or archive stream failures
    #[error("I/O error: {0}")]
    Io(String),

    /// A backend's mount or endpoint is not present
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// No matching archive or policy
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Malformed or unreadable policy document
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rendering machine-readable output failed
    #[error("JSON error: {0}")]
    Json(String),

    /// Backend variant that does not support the requested operation
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Invalid input (unknown backend id, unsafe member path, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation was cancelled through its cancel flag
    #[error("Operation cancelled")]
    Cancelled,
}

impl VaultError {
    /// Create a "not found" error for archives
    pub fn archive_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for the backup policy
    pub fn policy_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup policy",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an "unavailable" error
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<walkdir::Error> for VaultError {
    fn from(err: walkdir::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for VaultError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for nodevault operations
pub type VaultResult<T> = Result<T, VaultError>;
