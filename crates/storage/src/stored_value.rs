//! Request and response types of the store boundary

use serde::{Deserialize, Serialize};
use serde_json::Value;
use settee_core::Cas;
use std::time::Duration;
use thiserror::Error;

/// Result type for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key does not exist
    #[error("key not found: {0}")]
    NotFound(String),

    /// Supplied CAS does not match the stored value
    #[error("cas mismatch: {0}")]
    CasMismatch(String),

    /// Transport or driver failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Returns true for the not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<StoreError> for settee_core::Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => settee_core::Error::NotFound(key),
            StoreError::CasMismatch(key) => settee_core::Error::CasMismatch { key },
            StoreError::Transport(msg) => settee_core::Error::Store(msg),
        }
    }
}

/// A value read from the store together with its CAS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    /// Store key
    pub key: String,
    /// Stored document
    pub value: Value,
    /// CAS at read time
    pub cas: Cas,
}

/// Outcome of a multi-key read
///
/// Keys are partitioned three ways; a single failing key never fails the
/// whole batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiGet {
    /// Keys that were found
    pub found: Vec<StoredValue>,
    /// Keys that do not exist
    pub misses: Vec<String>,
    /// Keys whose read failed
    pub errors: Vec<(String, StoreError)>,
}

/// Durability requirement forwarded to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Acknowledged once in memory on the primary
    #[default]
    Memory,
    /// Replicated to a majority
    Majority,
    /// Persisted to disk on the primary
    Persisted,
}

/// Options for an upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Only write if the stored CAS still matches
    pub cas: Option<Cas>,
    /// Time until the document expires
    pub expiry: Option<Duration>,
    /// Durability requirement
    pub durability: Durability,
}

impl UpsertOptions {
    /// Options carrying a CAS check
    pub fn with_cas(cas: Option<Cas>) -> Self {
        UpsertOptions {
            cas,
            ..UpsertOptions::default()
        }
    }
}

/// Options for a remove
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Only remove if the stored CAS still matches
    pub cas: Option<Cas>,
}
