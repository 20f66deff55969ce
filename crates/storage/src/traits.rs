//! Store boundary
//!
//! The mapper never talks to a driver directly. Everything it needs from a
//! key-value store is the four calls below; each may suspend, and each is a
//! point where a caller may layer timeouts.

use async_trait::async_trait;
use serde_json::Value;
use settee_core::Cas;

use crate::stored_value::{MultiGet, RemoveOptions, StoreResult, StoredValue, UpsertOptions};

/// Abstract key-value store with CAS
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](Store::get) | Read one key, `None` when absent |
/// | [`get_multi`](Store::get_multi) | Read many keys in one round trip |
/// | [`upsert`](Store::upsert) | Write a key, optionally CAS-checked |
/// | [`remove`](Store::remove) | Delete a key, optionally CAS-checked |
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a single key
    ///
    /// Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>>;

    /// Read many keys
    ///
    /// The default issues one `get` per key. Drivers with a native batch
    /// read should override it.
    async fn get_multi(&self, keys: &[String]) -> StoreResult<MultiGet> {
        let mut out = MultiGet::default();
        for key in keys {
            match self.get(key).await {
                Ok(Some(found)) => out.found.push(found),
                Ok(None) => out.misses.push(key.clone()),
                Err(e) => out.errors.push((key.clone(), e)),
            }
        }
        Ok(out)
    }

    /// Write `value` at `key`, returning the new CAS
    ///
    /// Fails with `CasMismatch` if `options.cas` is set and stale.
    async fn upsert(&self, key: &str, value: Value, options: UpsertOptions) -> StoreResult<Cas>;

    /// Delete `key`
    ///
    /// Fails with `NotFound` if the key does not exist and with
    /// `CasMismatch` if `options.cas` is set and stale.
    async fn remove(&self, key: &str, options: RemoveOptions) -> StoreResult<()>;
}
