//! Batched, memoized reference resolution

use futures_util::future::BoxFuture;
use settee_core::{key_to_string, FieldPath, Result};
use settee_schema::Schema;
use settee_storage::{Store, StoredValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{FetchMemo, Populate};
use crate::document::{Document, Slot};
use crate::mapper::ModelRegistry;

/// One population call
///
/// Created at the start of a top-level find or populate and consumed by
/// [`finish`](Resolver::finish); the memo goes with it.
pub(crate) struct Resolver {
    store: Arc<dyn Store>,
    registry: Arc<ModelRegistry>,
    max_depth: usize,
    memo: FetchMemo,
    missing: Vec<String>,
}

impl Resolver {
    pub(crate) fn new(store: Arc<dyn Store>, registry: Arc<ModelRegistry>, max_depth: usize) -> Self {
        Resolver {
            store,
            registry,
            max_depth,
            memo: FetchMemo::new(),
            missing: Vec::new(),
        }
    }

    /// Read `keys` through the memo
    ///
    /// Keys not yet known are read with one multi-get. Absent keys and keys
    /// whose read failed are recorded as missing. A failure of the whole
    /// batch is returned.
    pub(crate) async fn fetch(&mut self, keys: &[String]) -> Result<HashMap<String, StoredValue>> {
        let mut unknown: Vec<String> = Vec::new();
        for key in keys {
            if !self.memo.contains(key) && !unknown.contains(key) {
                unknown.push(key.clone());
            }
        }

        if !unknown.is_empty() {
            let batch = self.store.get_multi(&unknown).await?;
            for found in batch.found {
                self.memo.found(found);
            }
            for key in batch.misses {
                self.memo.absent(key);
            }
            for (key, error) in batch.errors {
                warn!(target: "settee::populate", key = %key, error = %error, "Read failed, reporting key as missing");
                self.memo.absent(key);
            }
        }

        let mut out = HashMap::new();
        for key in keys {
            match self.memo.lookup(key) {
                Some(Some(found)) => {
                    out.insert(key.clone(), found.clone());
                }
                _ => self.missing.push(key.clone()),
            }
        }
        Ok(out)
    }

    /// Populate `docs` as `spec` asks
    pub(crate) async fn run(&mut self, docs: &mut [Document], spec: &Populate) -> Result<()> {
        self.apply(docs, Vec::new(), spec.clone(), 0).await
    }

    /// Distinct missing keys, in the order first seen
    pub(crate) fn finish(self) -> Vec<String> {
        debug!(
            target: "settee::populate",
            fetched = self.memo.len(),
            memo_hits = self.memo.hits(),
            missing = self.missing.len(),
            "Population finished"
        );
        let mut out: Vec<String> = Vec::with_capacity(self.missing.len());
        for key in self.missing {
            if !out.contains(&key) {
                out.push(key);
            }
        }
        out
    }

    /// Apply `spec` to the documents reached from `docs` through the
    /// reference chain `via`
    fn apply<'a>(
        &'a mut self,
        docs: &'a mut [Document],
        via: Vec<FieldPath>,
        spec: Populate,
        depth: usize,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match spec {
                Populate::Many(specs) => {
                    for spec in specs {
                        self.apply(&mut *docs, via.clone(), spec, depth).await?;
                    }
                }
                Populate::All => {
                    if depth >= self.max_depth {
                        return Ok(());
                    }
                    let paths = declared_refs(&descend(docs, &via));
                    for path in &paths {
                        self.resolve_path(&mut *docs, &via, path).await?;
                    }
                    for path in paths {
                        let mut next = via.clone();
                        next.push(path);
                        self.apply(&mut *docs, next, Populate::All, depth + 1).await?;
                    }
                }
                Populate::Path(path) => {
                    let split = descend(docs, &via).iter().find_map(|doc| {
                        let (ref_path, _) = doc.schema().ref_covering(&path)?;
                        let rest = path.strip_prefix(ref_path)?;
                        Some((ref_path.clone(), rest))
                    });
                    let Some((ref_path, rest)) = split else {
                        debug!(target: "settee::populate", path = %path, "No reference declared on path");
                        return Ok(());
                    };
                    self.resolve_path(&mut *docs, &via, &ref_path).await?;
                    if !rest.is_empty() {
                        let mut next = via;
                        next.push(ref_path);
                        self.apply(docs, next, Populate::Path(rest), depth + 1).await?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Resolve one reference path on every reached document with a single
    /// batched read
    async fn resolve_path(
        &mut self,
        docs: &mut [Document],
        via: &[FieldPath],
        ref_path: &FieldPath,
    ) -> Result<()> {
        let mut targets: HashMap<String, Option<Arc<Schema>>> = HashMap::new();
        let mut keys: Vec<String> = Vec::new();

        for doc in descend(docs, via) {
            let Some(spec) = doc.schema().refs().get(ref_path) else {
                continue;
            };
            let schema = targets
                .entry(spec.model.clone())
                .or_insert_with(|| self.registry.get(&spec.model))
                .clone();
            let Some(schema) = schema else {
                continue;
            };
            for (_, slot) in doc.leaf_slots(ref_path) {
                if let Some(full) = slot_key(slot, &schema) {
                    if !keys.contains(&full) {
                        keys.push(full);
                    }
                }
            }
        }

        for (model, schema) in &targets {
            if schema.is_none() {
                warn!(target: "settee::populate", model = %model, path = %ref_path, "Reference model not registered, skipping path");
            }
        }
        if keys.is_empty() {
            return Ok(());
        }

        let fetched = self.fetch(&keys).await?;
        debug!(
            target: "settee::populate",
            path = %ref_path,
            requested = keys.len(),
            found = fetched.len(),
            "Resolved reference path"
        );

        for doc in descend(docs, via) {
            let Some(spec) = doc.schema().refs().get(ref_path) else {
                continue;
            };
            let Some(Some(schema)) = targets.get(&spec.model).cloned() else {
                continue;
            };
            for (_, slot) in doc.leaf_slots_mut(ref_path) {
                let Some(found) = slot_key(slot, &schema).and_then(|k| fetched.get(&k)) else {
                    continue;
                };
                let populated = Document::from_stored(Arc::clone(&schema), found.value.clone(), Some(found.cas));
                *slot = Slot::Doc(Box::new(populated));
            }
        }
        Ok(())
    }
}

/// Full store key held by an unresolved reference slot
fn slot_key(slot: &Slot, target: &Schema) -> Option<String> {
    match slot {
        Slot::Value(v) => key_to_string(v).map(|k| target.key_policy().to_full(&k)),
        _ => None,
    }
}

/// Documents reached from `docs` by following populated references
/// along `via`
fn descend<'a>(docs: &'a mut [Document], via: &[FieldPath]) -> Vec<&'a mut Document> {
    let mut level: Vec<&'a mut Document> = docs.iter_mut().collect();
    for path in via {
        level = level
            .into_iter()
            .flat_map(|doc| doc.leaf_slots_mut(path))
            .filter_map(|(_, slot)| match slot {
                Slot::Doc(doc) => Some(&mut **doc),
                _ => None,
            })
            .collect();
    }
    level
}

/// Union of declared reference paths, shallowest first
fn declared_refs(docs: &[&mut Document]) -> Vec<FieldPath> {
    let mut out: Vec<FieldPath> = Vec::new();
    for doc in docs.iter() {
        for path in doc.schema().ref_paths() {
            if !out.contains(path) {
                out.push(path.clone());
            }
        }
    }
    out
}
