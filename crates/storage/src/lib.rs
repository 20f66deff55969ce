//! Store boundary for settee
//!
//! This crate provides:
//! - Store: the async key-value contract the mapper is written against
//! - StoredValue / MultiGet / UpsertOptions / RemoveOptions: its request and response types
//! - StoreError: driver failures, distinguishing not-found and CAS mismatch
//! - MemoryStore: an in-process implementation with CAS, expiry and read counters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod stored_value;
pub mod traits;

pub use memory::MemoryStore;
pub use stored_value::{
    Durability, MultiGet, RemoveOptions, StoreError, StoreResult, StoredValue, UpsertOptions,
};
pub use traits::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use settee_core::Cas;
    use std::time::Duration;

    // ========================================================================
    // Single-key operations
    // ========================================================================

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert_eq!(store.fetch_count("nope"), 1);
    }

    #[tokio::test]
    async fn test_upsert_then_get_returns_cas() {
        let store = MemoryStore::new();
        let cas = store
            .upsert("k", json!({"a": 1}), UpsertOptions::default())
            .await
            .unwrap();
        let read = store.get("k").await.unwrap().unwrap();
        assert_eq!(read.value, json!({"a": 1}));
        assert_eq!(read.cas, cas);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_cas_is_monotonic_per_write() {
        let store = MemoryStore::new();
        let c1 = store.upsert("k", json!(1), UpsertOptions::default()).await.unwrap();
        let c2 = store.upsert("k", json!(2), UpsertOptions::default()).await.unwrap();
        assert!(c2.as_u64() > c1.as_u64());
    }

    // ========================================================================
    // CAS enforcement
    // ========================================================================

    #[tokio::test]
    async fn test_stale_cas_upsert_fails_without_writing() {
        let store = MemoryStore::new();
        let stale = store.upsert("k", json!(1), UpsertOptions::default()).await.unwrap();
        store.upsert("k", json!(2), UpsertOptions::default()).await.unwrap();

        let err = store
            .upsert("k", json!(3), UpsertOptions::with_cas(Some(stale)))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::CasMismatch("k".to_string()));
        assert_eq!(store.peek("k"), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_current_cas_upsert_succeeds() {
        let store = MemoryStore::new();
        let cas = store.upsert("k", json!(1), UpsertOptions::default()).await.unwrap();
        store
            .upsert("k", json!(2), UpsertOptions::with_cas(Some(cas)))
            .await
            .unwrap();
        assert_eq!(store.peek("k"), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_cas_upsert_on_missing_key_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .upsert("k", json!(1), UpsertOptions::with_cas(Some(Cas::new(9))))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove_semantics() {
        let store = MemoryStore::new();
        let cas = store.upsert("k", json!(1), UpsertOptions::default()).await.unwrap();

        let err = store
            .remove("k", RemoveOptions { cas: Some(Cas::new(cas.as_u64() + 100)) })
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::CasMismatch("k".to_string()));

        store.remove("k", RemoveOptions { cas: Some(cas) }).await.unwrap();
        assert!(!store.contains("k"));

        let err = store.remove("k", RemoveOptions::default()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    // ========================================================================
    // Batch reads, expiry, failures
    // ========================================================================

    #[tokio::test]
    async fn test_get_multi_partitions_keys() {
        let store = MemoryStore::new();
        store.upsert("a", json!(1), UpsertOptions::default()).await.unwrap();
        store.upsert("bad_1", json!(2), UpsertOptions::default()).await.unwrap();
        store.fail_keys_with_prefix("bad_");

        let keys = vec!["a".to_string(), "b".to_string(), "bad_1".to_string()];
        let result = store.get_multi(&keys).await.unwrap();
        assert_eq!(result.found.len(), 1);
        assert_eq!(result.found[0].key, "a");
        assert_eq!(result.misses, vec!["b".to_string()]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].0, "bad_1");
        assert_eq!(store.multi_get_count(), 1);

        store.clear_failures();
        assert!(store.get("bad_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_entries_read_as_missing() {
        let store = MemoryStore::new();
        let options = UpsertOptions {
            expiry: Some(Duration::from_millis(0)),
            ..UpsertOptions::default()
        };
        store.upsert("k", json!(1), options).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_eviction_keeps_entry_rewritten_after_expiry() {
        let store = MemoryStore::new();
        let options = UpsertOptions {
            expiry: Some(Duration::from_millis(0)),
            ..UpsertOptions::default()
        };
        store.upsert("k", json!(1), options).await.unwrap();
        let seen_expired_at = std::time::Instant::now();

        // A writer replaces the entry before the reader evicts it
        let fresh = store.upsert("k", json!(2), UpsertOptions::default()).await.unwrap();
        assert!(!store.evict_expired("k", seen_expired_at));
        let current = store.get("k").await.unwrap().unwrap();
        assert_eq!(current.value, json!(2));
        assert_eq!(current.cas, fresh);

        store.upsert("gone", json!(3), options).await.unwrap();
        assert!(store.evict_expired("gone", std::time::Instant::now()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_error_conversion() {
        let err: settee_core::Error = StoreError::CasMismatch("k".into()).into();
        assert!(err.is_cas_mismatch());
        let err: settee_core::Error = StoreError::Transport("down".into()).into();
        assert_eq!(err, settee_core::Error::Store("down".into()));
    }
}
