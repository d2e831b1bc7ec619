//! Error types for the Gatehouse service.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Gatehouse operations.
///
/// Locked accounts, bad credentials and exhausted buckets are ordinary
/// outcomes and are returned as values, not through this type.
#[derive(Error, Debug)]
pub enum GatehouseError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The shared counter store could not serve a request
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// The credential verifier failed for reasons other than a bad password
    #[error("Credential verification error: {0}")]
    Credentials(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Faults raised by a counter store backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The operation did not complete within the configured bound
    #[error("operation on {key} timed out after {elapsed:?}")]
    Timeout { key: String, elapsed: Duration },

    /// A compare-and-swap loop gave up after repeated conflicts
    #[error("gave up on {key} after {attempts} conflicting updates")]
    Contention { key: String, attempts: u32 },

    /// A stored value could not be decoded
    #[error("corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The backend itself is unreachable
    #[error("{0}")]
    Unavailable(String),
}

/// Result type alias for Gatehouse operations.
pub type Result<T> = std::result::Result<T, GatehouseError>;
