//! Settee - schema-driven document mapping over key-value stores
//!
//! Settee maps typed documents onto a key-value store: schemas are compiled
//! from descriptors, documents validate and coerce on assignment, secondary
//! indexes are kept as lookup documents, and references between documents
//! are resolved in batches.
//!
//! # Quick Start
//!
//! ```ignore
//! use settee::{Descriptor, Mapper, MapperConfig, MemoryStore, SaveOptions, SchemaBuilder};
//! use std::sync::Arc;
//!
//! let mapper = Mapper::new(Arc::new(MemoryStore::new()), MapperConfig::default())?;
//! mapper.register(
//!     SchemaBuilder::new("User")
//!         .field("name", Descriptor::string())
//!         .field("email", Descriptor::string().index()),
//! )?;
//!
//! let mut user = mapper.create("User", json!({"name": "ann", "email": "a@x.io"}))?;
//! mapper.save(&mut user, SaveOptions::default()).await?;
//! let found = mapper.find_by_index("User", "email", "a@x.io", Default::default()).await?;
//! ```
//!
//! # Architecture
//!
//! - `settee-core`: errors, keys, field paths, value helpers
//! - `settee-storage`: the `Store` boundary and an in-memory store
//! - `settee-schema`: descriptors, the schema compiler, hooks
//! - `settee-engine`: documents, index maintenance, population, the mapper

pub use settee_core::{Cas, Error, FieldPath, KeyPolicy, Lifecycle, Result};
pub use settee_engine::*;
pub use settee_schema::{
    Descriptor, FieldAccess, Hookable, IndexKind, PrimitiveType, Schema, SchemaBuilder,
    SerializeOptions,
};
pub use settee_storage::{Durability, MemoryStore, MultiGet, Store, StoreError, StoredValue};
