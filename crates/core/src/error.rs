//! Error types for settee
//!
//! This module defines the error taxonomy shared by every layer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Two failure classes never show up here:
//! - a missing key on a read (reads return `Option` / a `missing` list)
//! - a rejected field assignment (the value is left unchanged)

use thiserror::Error;

/// Result type alias for settee operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for settee
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Key does not exist where the operation requires it to
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Supplied CAS token does not match the stored document
    #[error("CAS mismatch on key {key}")]
    CasMismatch {
        /// Key whose CAS check failed
        key: String,
    },

    /// Transport or driver failure reported by the store
    #[error("Store error: {0}")]
    Store(String),

    /// A reference names a model that was never registered
    #[error("Missing reference model: {0}")]
    MissingReferenceModel(String),

    /// Descriptor could not be compiled into a schema
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Document key is absent or not string/number coercible
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A pre hook refused the operation
    #[error("Hook '{hook}' rejected operation: {reason}")]
    HookRejected {
        /// Hook event name (save, remove, index)
        hook: String,
        /// Reason given by the hook
        reason: String,
    },

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true for the soft "not found" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns true for an optimistic-concurrency conflict
    pub fn is_cas_mismatch(&self) -> bool {
        matches!(self, Error::CasMismatch { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
