//! Applying index operations to the store

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde_json::json;
use settee_core::{index_key, Result};
use settee_storage::{RemoveOptions, Store, StoreError, UpsertOptions};
use std::sync::Arc;
use tracing::debug;

use super::{IndexAction, IndexOperation};

/// Writes and removes lookup documents
///
/// Cheap to clone; a clone is moved into the task of a fire-and-forget
/// index write.
#[derive(Clone)]
pub struct IndexWriter {
    store: Arc<dyn Store>,
    prefix: String,
    delimiter: String,
    concurrency: usize,
}

impl IndexWriter {
    /// Writer over `store` using the given key format and fan-out
    pub fn new(
        store: Arc<dyn Store>,
        prefix: impl Into<String>,
        delimiter: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        IndexWriter {
            store,
            prefix: prefix.into(),
            delimiter: delimiter.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Store key of the lookup document for `name` / `value`
    pub fn key_for(&self, name: &str, value: &str) -> String {
        index_key(&self.prefix, name, &self.delimiter, value)
    }

    /// Apply `ops` for the document stored at `owner`
    ///
    /// Removes run before upserts. Removing a lookup document that does not
    /// exist is not an error. The first other failure is returned.
    pub async fn apply(&self, ops: Vec<IndexOperation>, owner: &str) -> Result<usize> {
        let (removes, upserts): (Vec<_>, Vec<_>) =
            ops.into_iter().partition(|op| op.action == IndexAction::Remove);
        let total = removes.len() + upserts.len();

        stream::iter(removes)
            .map(|op| self.remove_one(op))
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        stream::iter(upserts)
            .map(|op| self.upsert_one(op, owner))
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        debug!(target: "settee::index", owner, total, "Applied index operations");
        Ok(total)
    }

    async fn remove_one(&self, op: IndexOperation) -> Result<()> {
        let key = self.key_for(&op.name, &op.value);
        match self.store.remove(&key, RemoveOptions::default()).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert_one(&self, op: IndexOperation, owner: &str) -> Result<()> {
        let key = self.key_for(&op.name, &op.value);
        self.store
            .upsert(&key, json!({ "key": owner }), UpsertOptions::default())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settee_storage::MemoryStore;

    fn op(value: &str, action: IndexAction) -> IndexOperation {
        IndexOperation {
            name: "email".to_string(),
            value: value.to_string(),
            action,
        }
    }

    #[tokio::test]
    async fn test_apply_writes_and_removes() {
        let store = Arc::new(MemoryStore::new());
        let writer = IndexWriter::new(store.clone(), "$_ref_by_", "_", 4);
        writer
            .apply(vec![op("a@x", IndexAction::Upsert)], "user_1")
            .await
            .unwrap();
        assert_eq!(store.peek("$_ref_by_email_a@x"), Some(json!({"key": "user_1"})));

        let applied = writer
            .apply(
                vec![op("a@x", IndexAction::Remove), op("b@x", IndexAction::Upsert)],
                "user_1",
            )
            .await
            .unwrap();
        assert_eq!(applied, 2);
        assert!(!store.contains("$_ref_by_email_a@x"));
        assert!(store.contains("$_ref_by_email_b@x"));
    }

    #[tokio::test]
    async fn test_removing_absent_lookup_is_ok() {
        let store = Arc::new(MemoryStore::new());
        let writer = IndexWriter::new(store, "$_ref_by_", "_", 1);
        writer
            .apply(vec![op("gone", IndexAction::Remove)], "user_1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.fail_keys_with_prefix("$_ref_by_");
        let writer = IndexWriter::new(store, "$_ref_by_", "_", 2);
        let err = writer
            .apply(vec![op("a@x", IndexAction::Upsert)], "user_1")
            .await
            .unwrap_err();
        assert!(matches!(err, settee_core::Error::Store(_)));
    }
}
