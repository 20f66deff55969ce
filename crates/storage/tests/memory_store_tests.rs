//! Integration tests for the store boundary
//!
//! These tests verify that `MemoryStore` behaves like a CAS key-value store
//! under concurrent access:
//! - Exactly one writer wins a CAS race
//! - Injected failures surface per key in batch reads
//! - Read counters track every key read
//! - The default `get_multi` partitions keys the same way

use async_trait::async_trait;
use serde_json::{json, Value};
use settee_core::Cas;
use settee_storage::{
    MemoryStore, RemoveOptions, Store, StoreError, StoreResult, StoredValue, UpsertOptions,
};
use std::sync::Arc;

// ============================================================================
// Helper Functions
// ============================================================================

async fn seeded(keys: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for key in keys {
        store
            .upsert(key, json!({"key": key}), UpsertOptions::default())
            .await
            .unwrap();
    }
    store
}

/// Store that only answers single reads, so batch reads use the default
struct SingleReads(MemoryStore);

#[async_trait]
impl Store for SingleReads {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        self.0.get(key).await
    }

    async fn upsert(&self, key: &str, value: Value, options: UpsertOptions) -> StoreResult<Cas> {
        self.0.upsert(key, value, options).await
    }

    async fn remove(&self, key: &str, options: RemoveOptions) -> StoreResult<()> {
        self.0.remove(key, options).await
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cas_race_has_one_winner() {
    let store = seeded(&["doc"]).await;
    let cas = store.get("doc").await.unwrap().unwrap().cas;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .upsert("doc", json!({"writer": i}), UpsertOptions::with_cas(Some(cas)))
                .await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(StoreError::CasMismatch(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(store.write_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_on_distinct_keys() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let key = format!("k{}", i);
            store.upsert(&key, json!(i), UpsertOptions::default()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(store.len(), 32);
    assert_eq!(store.peek("k7"), Some(json!(7)));
}

// ============================================================================
// Batch reads
// ============================================================================

#[tokio::test]
async fn test_injected_failures_are_per_key() {
    let store = seeded(&["user_1", "post_1"]).await;
    store.fail_keys_with_prefix("post_");

    let keys = vec!["user_1".to_string(), "post_1".to_string(), "user_2".to_string()];
    let batch = store.get_multi(&keys).await.unwrap();
    assert_eq!(batch.found.len(), 1);
    assert_eq!(batch.misses, vec!["user_2".to_string()]);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].0, "post_1");

    let err = store
        .remove("post_1", RemoveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));

    store.clear_failures();
    assert!(store.get("post_1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_read_counters() {
    let store = seeded(&["a", "b"]).await;
    store.reset_stats();

    store.get("a").await.unwrap();
    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    store.get_multi(&keys).await.unwrap();

    assert_eq!(store.fetch_count("a"), 2);
    assert_eq!(store.fetch_count("b"), 1);
    assert_eq!(store.fetch_count("c"), 1);
    assert_eq!(store.multi_get_count(), 1);
    // peek does not count
    store.peek("a");
    assert_eq!(store.fetch_count("a"), 2);
}

#[tokio::test]
async fn test_default_get_multi() {
    let store = SingleReads(MemoryStore::new());
    store
        .upsert("a", json!(1), UpsertOptions::default())
        .await
        .unwrap();
    store.0.fail_keys_with_prefix("x");

    let keys = vec!["a".to_string(), "b".to_string(), "x1".to_string()];
    let batch = store.get_multi(&keys).await.unwrap();
    assert_eq!(batch.found[0].value, json!(1));
    assert_eq!(batch.misses, vec!["b".to_string()]);
    assert_eq!(batch.errors[0].0, "x1");
}
