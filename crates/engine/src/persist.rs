//! Persistence of documents
//!
//! ## Save
//!
//! 1. `save` pre hooks (a rejection aborts before any write)
//! 2. referenced documents that were never stored are saved first, deepest
//!    reference path first, with bounded fan-out; their slots are then
//!    rewritten to the referenced key
//! 3. the document is upserted at its full key, forwarding the caller's
//!    CAS, expiry and durability
//! 4. lookup documents are reconciled against the snapshot of the last
//!    read or save, waiting or in the background
//! 5. `save` post hooks and a `Save` event
//!
//! Lookup documents are written after the primary document so a CAS
//! conflict leaves them untouched.
//!
//! ## Remove
//!
//! Optional cascade over referenced documents (one level), then the store
//! remove, then removal of every lookup document named by either the last
//! snapshot or the current values.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use settee_core::{key_to_string, Cas, Error, FieldPath, Lifecycle, Result};
use settee_storage::{Durability, RemoveOptions as StoreRemoveOptions, UpsertOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::document::{Document, Slot};
use crate::events::MapperEvent;
use crate::index::{diff, removal_ops, IndexOperation};
use crate::mapper::Mapper;

/// Options of one save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Write only if the stored document still has this CAS
    pub cas: Option<Cas>,
    /// Expire the stored document after this long
    pub expiry: Option<Duration>,
    /// Durability requirement forwarded to the store
    pub durability: Durability,
    /// Wait for lookup documents; the mapper config decides when unset
    pub wait_for_index: Option<bool>,
}

impl SaveOptions {
    /// Options checking `cas`
    pub fn with_cas(cas: Option<Cas>) -> Self {
        SaveOptions {
            cas,
            ..SaveOptions::default()
        }
    }
}

/// Options of one remove
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove only if the stored document still has this CAS
    pub cas: Option<Cas>,
    /// Remove referenced documents first
    pub remove_refs: bool,
    /// Wait for lookup documents; the mapper config decides when unset
    pub wait_for_index: Option<bool>,
}

/// Documents that can be written to and removed from a store
#[async_trait]
pub trait Persistable {
    /// Write the document and reconcile its lookup documents
    ///
    /// Returns the new CAS. Fails with `CasMismatch` when `options.cas` is
    /// stale and with `HookRejected` when a pre hook refuses.
    async fn save(&mut self, mapper: &Mapper, options: SaveOptions) -> Result<Cas>;

    /// Remove the document and its lookup documents
    async fn remove(&mut self, mapper: &Mapper, options: RemoveOptions) -> Result<()>;

    /// Reconcile lookup documents with the current values
    ///
    /// Returns the number of operations issued.
    async fn index(&mut self, mapper: &Mapper, wait: bool) -> Result<usize>;

    /// Remove every lookup document the document may own
    async fn remove_indexes(&mut self, mapper: &Mapper, wait: bool) -> Result<usize>;
}

#[async_trait]
impl Persistable for Document {
    async fn save(&mut self, mapper: &Mapper, options: SaveOptions) -> Result<Cas> {
        let result = save_document(self, mapper, options).await;
        if let Err(e) = &result {
            report_failure(self, mapper, Lifecycle::Save, e);
        }
        result
    }

    async fn remove(&mut self, mapper: &Mapper, options: RemoveOptions) -> Result<()> {
        let result = remove_document(self, mapper, options).await;
        if let Err(e) = &result {
            report_failure(self, mapper, Lifecycle::Remove, e);
        }
        result
    }

    async fn index(&mut self, mapper: &Mapper, wait: bool) -> Result<usize> {
        let schema = Arc::clone(self.schema());
        if schema.indexes().is_empty() {
            return Ok(0);
        }
        schema.hooks().run_pre(Lifecycle::Index, self)?;

        let ops = diff(self.prior_index(), &self.index_snapshot());
        let count = write_indexes(self, mapper, ops, wait).await?;
        self.refresh_prior_index();

        schema.hooks().run_post(Lifecycle::Index, self);
        Ok(count)
    }

    async fn remove_indexes(&mut self, mapper: &Mapper, wait: bool) -> Result<usize> {
        if self.schema().indexes().is_empty() {
            return Ok(0);
        }
        let ops = removal_ops(self.prior_index(), &self.index_snapshot());
        write_indexes(self, mapper, ops, wait).await
    }
}

async fn save_document(doc: &mut Document, mapper: &Mapper, options: SaveOptions) -> Result<Cas> {
    let schema = Arc::clone(doc.schema());
    schema.hooks().run_pre(Lifecycle::Save, doc)?;
    let key = doc.full_key()?;
    debug!(
        target: "settee::save",
        model = %schema.name(),
        key = %key,
        fields = doc.stored_field_count(),
        "Saving document"
    );

    save_references(doc, mapper, &options).await?;

    let config = mapper.config();
    let value = doc.storage_value(
        config.store_full_key,
        config.store_full_reference_id,
        config.minimize,
    );
    let upsert = UpsertOptions {
        cas: options.cas,
        expiry: options.expiry,
        durability: options.durability,
    };
    let cas = mapper.store().upsert(&key, value, upsert).await?;
    doc.set_cas(Some(cas));

    let wait = options.wait_for_index.unwrap_or(config.wait_for_index);
    doc.index(mapper, wait).await?;

    schema.hooks().run_post(Lifecycle::Save, doc);
    mapper.events().emit(MapperEvent::Save {
        model: schema.name().to_string(),
        key,
    });
    Ok(cas)
}

async fn remove_document(doc: &mut Document, mapper: &Mapper, options: RemoveOptions) -> Result<()> {
    let schema = Arc::clone(doc.schema());
    schema.hooks().run_pre(Lifecycle::Remove, doc)?;
    let key = doc.full_key()?;

    if options.remove_refs {
        remove_references(doc, mapper, &options).await?;
    }

    mapper
        .store()
        .remove(&key, StoreRemoveOptions { cas: options.cas })
        .await?;
    doc.set_cas(None);
    debug!(target: "settee::remove", model = %schema.name(), key = %key, "Removed document");

    let wait = options.wait_for_index.unwrap_or(mapper.config().wait_for_index);
    doc.remove_indexes(mapper, wait).await?;

    schema.hooks().run_post(Lifecycle::Remove, doc);
    mapper.events().emit(MapperEvent::Remove {
        model: schema.name().to_string(),
        key,
    });
    Ok(())
}

/// Publish a failed save or remove
fn report_failure(doc: &Document, mapper: &Mapper, lifecycle: Lifecycle, error: &Error) {
    let key = doc.document_key(true).unwrap_or_default();
    debug!(target: "settee::save", model = %doc.model_name(), key = %key, lifecycle = %lifecycle, error = %error, "Operation failed");
    mapper.events().emit(MapperEvent::Error {
        model: doc.model_name().to_string(),
        key,
        lifecycle,
        message: error.to_string(),
    });
}

/// Issue index operations for `doc`, waiting or in the background
async fn write_indexes(
    doc: &Document,
    mapper: &Mapper,
    ops: Vec<IndexOperation>,
    wait: bool,
) -> Result<usize> {
    let count = ops.len();
    if count == 0 {
        return Ok(0);
    }
    let key = doc.full_key()?;
    let owner = doc
        .document_key(mapper.config().store_full_reference_id)
        .unwrap_or_else(|| key.clone());
    let model = doc.model_name().to_string();
    let writer = mapper.index_writer();
    let events = mapper.events().clone();

    if wait {
        if let Err(e) = writer.apply(ops, &owner).await {
            warn!(target: "settee::index", model = %model, key = %key, error = %e, "Index write failed");
            return Err(e);
        }
        events.emit(MapperEvent::Index {
            model,
            key,
            operations: count,
        });
        return Ok(count);
    }

    tokio::spawn(async move {
        match writer.apply(ops, &owner).await {
            Ok(operations) => events.emit(MapperEvent::Index {
                model,
                key,
                operations,
            }),
            Err(e) => {
                warn!(target: "settee::index", model = %model, key = %key, error = %e, "Background index write failed");
                events.emit(MapperEvent::Error {
                    model,
                    key,
                    lifecycle: Lifecycle::Index,
                    message: e.to_string(),
                });
            }
        }
    });
    Ok(count)
}

/// Save referenced documents that were never stored, deepest path first
async fn save_references(doc: &mut Document, mapper: &Mapper, options: &SaveOptions) -> Result<()> {
    let schema = Arc::clone(doc.schema());
    let child_options = SaveOptions {
        cas: None,
        expiry: None,
        durability: options.durability,
        wait_for_index: options.wait_for_index,
    };
    let full_refs = mapper.config().store_full_reference_id;
    let limit = mapper.config().max_concurrency;

    for path in schema.ref_paths_deepest_first() {
        let unsaved: Vec<FieldPath> = doc
            .leaf_slots(path)
            .into_iter()
            .filter(|(_, slot)| slot.is_unsaved_doc())
            .map(|(at, _)| at)
            .collect();
        if unsaved.is_empty() {
            continue;
        }
        debug!(target: "settee::save", path = %path, count = unsaved.len(), "Saving referenced documents");

        let children: Vec<&mut Document> = doc
            .leaf_slots_mut(path)
            .into_iter()
            .filter_map(|(at, slot)| match slot {
                Slot::Doc(child) if unsaved.contains(&at) => Some(&mut **child),
                _ => None,
            })
            .collect();
        let saves: Vec<_> = children
            .into_iter()
            .map(|child| child.save(mapper, child_options))
            .collect();
        stream::iter(saves)
            .buffer_unordered(limit)
            .try_collect::<Vec<Cas>>()
            .await?;

        for (at, slot) in doc.leaf_slots_mut(path) {
            if !unsaved.contains(&at) {
                continue;
            }
            let key = match &*slot {
                Slot::Doc(child) => child.document_key(full_refs),
                _ => None,
            };
            if let Some(key) = key {
                *slot = Slot::Value(Value::String(key));
            }
        }
    }
    Ok(())
}

/// Remove the documents `doc` references
///
/// Populated references are removed as held; key references are read
/// first. Referenced documents do not cascade further, so reference
/// cycles terminate. Already missing documents are skipped.
async fn remove_references(doc: &mut Document, mapper: &Mapper, options: &RemoveOptions) -> Result<()> {
    let schema = Arc::clone(doc.schema());
    let mut children: Vec<Document> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    let mut key_models: Vec<Arc<settee_schema::Schema>> = Vec::new();

    for path in schema.ref_paths_deepest_first() {
        let Some(spec) = schema.refs().get(path) else {
            continue;
        };
        let target = mapper.registry().get(&spec.model);
        for (_, slot) in doc.leaf_slots(path) {
            match slot {
                Slot::Doc(child) => children.push(child.as_ref().clone()),
                Slot::Value(v) => {
                    let (Some(target), Some(short)) = (&target, key_to_string(v)) else {
                        warn!(target: "settee::remove", model = %spec.model, path = %path, "Reference cannot be resolved, not removing");
                        continue;
                    };
                    let full = target.key_policy().to_full(&short);
                    if !keys.contains(&full) {
                        keys.push(full);
                        key_models.push(Arc::clone(target));
                    }
                }
                _ => {}
            }
        }
    }

    if !keys.is_empty() {
        let batch = mapper.store().get_multi(&keys).await?;
        for found in batch.found {
            if let Some(i) = keys.iter().position(|k| *k == found.key) {
                children.push(Document::from_stored(
                    Arc::clone(&key_models[i]),
                    found.value,
                    Some(found.cas),
                ));
            }
        }
        if let Some((key, error)) = batch.errors.into_iter().next() {
            return Err(Error::Store(format!("reading {} for removal: {}", key, error)));
        }
    }

    let child_options = RemoveOptions {
        cas: None,
        remove_refs: false,
        wait_for_index: options.wait_for_index,
    };
    let limit = mapper.config().max_concurrency;
    let removes: Vec<_> = children
        .iter_mut()
        .map(|child| child.remove(mapper, child_options))
        .collect();
    let results: Vec<Result<()>> = stream::iter(removes).buffer_unordered(limit).collect().await;
    for result in results {
        match result {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
