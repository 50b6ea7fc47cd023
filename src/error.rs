//! Error types for JsonStore
//!
//! Provides a unified error type for all store operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for JsonStore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Load Errors
    // -------------------------------------------------------------------------
    /// The backing file could not be read or does not hold a JSON object.
    #[error("failed to load store from {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    // -------------------------------------------------------------------------
    // Mapping Errors
    // -------------------------------------------------------------------------
    #[error("key not found: {0:?}")]
    KeyNotFound(String),

    #[error("value for key {key:?} cannot be represented as JSON: {reason}")]
    UnrepresentableValue { key: String, reason: String },

    #[error("value for key {key:?} has an unexpected type: {reason}")]
    TypeMismatch { key: String, reason: String },

    // -------------------------------------------------------------------------
    // Sync Errors
    // -------------------------------------------------------------------------
    /// Writing the temp file or replacing the backing file failed.
    /// The backing file and in-memory state are unchanged.
    #[error("failed to sync store to {}: {source}", .path.display())]
    Sync {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Both the scoped body and the sync on scope exit failed.
    #[error("scope failed ({body}) and the exit sync failed too ({sync})")]
    ScopeExit {
        body: Box<StoreError>,
        sync: Box<StoreError>,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// True for errors raised by the sync protocol.
    pub fn is_sync(&self) -> bool {
        matches!(self, StoreError::Sync { .. })
    }
}
