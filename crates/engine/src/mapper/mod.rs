//! The mapper
//!
//! `Mapper` ties the pieces together: it owns the store handle, the model
//! registry, the configuration and the event bus, compiles and registers
//! schemas, creates documents and runs finds. Cloning a mapper is cheap and
//! every clone shares the same state.

mod config;
mod registry;

pub use config::{MapperConfig, CONFIG_FILE_NAME};
pub use registry::ModelRegistry;

use serde_json::Value;
use settee_core::{index_key, key_to_string, Cas, Error, Result};
use settee_schema::{Schema, SchemaBuilder};
use settee_storage::Store;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::document::Document;
use crate::events::{EventBus, MapperEvent};
use crate::index::IndexWriter;
use crate::persist::{Persistable, RemoveOptions, SaveOptions};
use crate::populate::{Populate, Resolver};

/// Keys to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ids {
    /// A single key
    One(String),
    /// A batch of keys
    Many(Vec<String>),
}

impl Ids {
    fn as_slice(&self) -> &[String] {
        match self {
            Ids::One(id) => std::slice::from_ref(id),
            Ids::Many(ids) => ids,
        }
    }
}

impl From<&str> for Ids {
    fn from(id: &str) -> Self {
        Ids::One(id.to_string())
    }
}

impl From<String> for Ids {
    fn from(id: String) -> Self {
        Ids::One(id)
    }
}

impl From<Vec<&str>> for Ids {
    fn from(ids: Vec<&str>) -> Self {
        Ids::Many(ids.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for Ids {
    fn from(ids: Vec<String>) -> Self {
        Ids::Many(ids)
    }
}

/// Options of a find
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// References to populate on the found documents
    pub populate: Option<Populate>,
    /// Return a batch for a single key; the mapper config decides when unset
    pub always_return_arrays: Option<bool>,
}

impl FindOptions {
    /// Options populating `spec`
    pub fn populate(spec: impl Into<Populate>) -> Self {
        FindOptions {
            populate: Some(spec.into()),
            ..FindOptions::default()
        }
    }
}

/// Found documents
#[derive(Debug, Clone)]
pub enum Found {
    /// Result of a single-key find
    One(Option<Document>),
    /// Result of a batch find
    Many(Vec<Document>),
}

/// Outcome of a find
#[derive(Debug, Clone)]
pub struct FindResult {
    /// Documents found
    pub found: Found,
    /// Full keys that were not in the store, including referenced keys
    /// that population could not resolve
    pub missing: Vec<String>,
}

impl FindResult {
    /// The document of a single-key find, or the first of a batch
    pub fn one(&self) -> Option<&Document> {
        match &self.found {
            Found::One(doc) => doc.as_ref(),
            Found::Many(docs) => docs.first(),
        }
    }

    /// Owned form of [`one`](FindResult::one)
    pub fn into_one(self) -> Option<Document> {
        match self.found {
            Found::One(doc) => doc,
            Found::Many(docs) => docs.into_iter().next(),
        }
    }

    /// All documents found
    pub fn into_vec(self) -> Vec<Document> {
        match self.found {
            Found::One(doc) => doc.into_iter().collect(),
            Found::Many(docs) => docs,
        }
    }

    /// Number of documents found
    pub fn len(&self) -> usize {
        match &self.found {
            Found::One(doc) => usize::from(doc.is_some()),
            Found::Many(docs) => docs.len(),
        }
    }

    /// Check if nothing was found
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MapperInner {
    store: Arc<dyn Store>,
    registry: Arc<ModelRegistry>,
    config: MapperConfig,
    events: EventBus,
}

/// Entry point of the document mapper
#[derive(Clone)]
pub struct Mapper {
    inner: Arc<MapperInner>,
}

impl Mapper {
    /// Mapper over `store`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` does not validate.
    pub fn new(store: Arc<dyn Store>, config: MapperConfig) -> Result<Self> {
        config.validate()?;
        info!(
            target: "settee::mapper",
            delimiter = %config.delimiter,
            wait_for_index = config.wait_for_index,
            max_concurrency = config.max_concurrency,
            "Mapper ready"
        );
        Ok(Mapper {
            inner: Arc::new(MapperInner {
                store,
                registry: Arc::new(ModelRegistry::new()),
                config,
                events: EventBus::default(),
            }),
        })
    }

    /// Mapper configured from `settee.toml` in `dir`
    ///
    /// A commented default file is written first if none exists.
    pub fn from_config_dir(store: Arc<dyn Store>, dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        MapperConfig::write_default_if_missing(&path)?;
        let config = MapperConfig::from_file(&path)?;
        Self::new(store, config)
    }

    /// Configuration
    pub fn config(&self) -> &MapperConfig {
        &self.inner.config
    }

    /// Store handle
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Registered models
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.inner.registry
    }

    /// Event bus
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Receive lifecycle events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MapperEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn index_writer(&self) -> IndexWriter {
        IndexWriter::new(
            Arc::clone(&self.inner.store),
            self.inner.config.ref_index_key_prefix.clone(),
            self.inner.config.delimiter.clone(),
            self.inner.config.max_concurrency,
        )
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// Compile and register a model
    pub fn register(&self, builder: SchemaBuilder) -> Result<Arc<Schema>> {
        let schema = builder.compile(&self.inner.config.delimiter)?;
        Ok(self.inner.registry.register(schema))
    }

    /// Compile and register a model from a JSON descriptor
    ///
    /// Type markers naming registered models become references.
    pub fn register_json(&self, name: &str, descriptor: &Value) -> Result<Arc<Schema>> {
        let registry = Arc::clone(&self.inner.registry);
        let is_model = move |marker: &str| registry.contains(marker);
        let builder = SchemaBuilder::from_json(name, descriptor, &is_model)?;
        self.register(builder)
    }

    /// Schema of a registered model
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingReferenceModel` if `name` is not registered.
    pub fn model(&self, name: &str) -> Result<Arc<Schema>> {
        self.inner
            .registry
            .get(name)
            .ok_or_else(|| Error::MissingReferenceModel(name.to_string()))
    }

    /// New unsaved document of `model`
    pub fn create(&self, model: &str, data: Value) -> Result<Document> {
        Ok(Document::new(self.model(model)?, data))
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Save `doc`
    pub async fn save(&self, doc: &mut Document, options: SaveOptions) -> Result<Cas> {
        doc.save(self, options).await
    }

    /// Remove `doc`
    pub async fn remove(&self, doc: &mut Document, options: RemoveOptions) -> Result<()> {
        doc.remove(self, options).await
    }

    // =========================================================================
    // Finds
    // =========================================================================

    /// Read documents of `model` by key
    ///
    /// Keys may be short or full. Absent keys are listed in `missing`, never
    /// raised. A single key returns `Found::One` unless arrays are asked
    /// for.
    pub async fn find_by_id(
        &self,
        model: &str,
        ids: impl Into<Ids>,
        options: FindOptions,
    ) -> Result<FindResult> {
        let schema = self.model(model)?;
        let ids = ids.into();
        let keys: Vec<String> = ids
            .as_slice()
            .iter()
            .map(|id| schema.key_policy().to_full(id))
            .collect();

        let mut resolver = self.resolver();
        let fetched = resolver.fetch(&keys).await?;
        let mut docs: Vec<Document> = keys
            .iter()
            .filter_map(|key| fetched.get(key))
            .map(|found| Document::from_stored(Arc::clone(&schema), found.value.clone(), Some(found.cas)))
            .collect();

        if let Some(spec) = &options.populate {
            resolver.run(&mut docs, spec).await?;
        }
        let missing = resolver.finish();
        debug!(
            target: "settee::populate",
            model,
            requested = keys.len(),
            found = docs.len(),
            missing = missing.len(),
            "find_by_id"
        );

        let arrays = options
            .always_return_arrays
            .unwrap_or(self.inner.config.always_return_arrays);
        let found = match ids {
            Ids::One(_) if !arrays => Found::One(docs.into_iter().next()),
            _ => Found::Many(docs),
        };
        Ok(FindResult { found, missing })
    }

    /// Read the document of `model` whose index `index` holds `value`
    ///
    /// A missing lookup document is reported in `missing` under its own
    /// key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSchema` if the model declares no such index.
    pub async fn find_by_index(
        &self,
        model: &str,
        index: &str,
        value: &str,
        options: FindOptions,
    ) -> Result<FindResult> {
        let schema = self.model(model)?;
        if schema.index_named(index).is_none() {
            return Err(Error::InvalidSchema(format!(
                "model {} has no index named {}",
                model, index
            )));
        }
        let config = &self.inner.config;
        let lookup = index_key(&config.ref_index_key_prefix, index, &config.delimiter, value);

        let owner = self
            .inner
            .store
            .get(&lookup)
            .await?
            .and_then(|found| found.value.get("key").and_then(key_to_string));
        match owner {
            Some(owner) => self.find_by_id(model, owner, options).await,
            None => {
                debug!(target: "settee::populate", model, lookup = %lookup, "No lookup document");
                let arrays = options.always_return_arrays.unwrap_or(config.always_return_arrays);
                let found = if arrays { Found::Many(Vec::new()) } else { Found::One(None) };
                Ok(FindResult {
                    found,
                    missing: vec![lookup],
                })
            }
        }
    }

    /// Populate references of documents already in hand
    ///
    /// Returns the full keys that could not be resolved.
    pub async fn populate(&self, docs: &mut [Document], spec: impl Into<Populate>) -> Result<Vec<String>> {
        let spec = spec.into();
        let mut resolver = self.resolver();
        resolver.run(docs, &spec).await?;
        Ok(resolver.finish())
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.registry),
            self.inner.config.populate_max_depth,
        )
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("models", &self.inner.registry.names())
            .field("config", &self.inner.config)
            .finish()
    }
}
