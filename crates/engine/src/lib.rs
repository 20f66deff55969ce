//! Document engine for settee
//!
//! This crate runs documents against a store:
//! - Mapper: registry, configuration, finds and the entry points below
//! - Document: field access, validation and serialization of one instance
//! - index: diffing of indexed values and lookup-document writes
//! - populate: batched, memoized reference resolution
//! - Persistable: save / remove / index with CAS and reference cascades
//! - events: broadcast of lifecycle events
//!
//! The engine is the only component that knows about:
//! - Cross-model lookups (through the registry)
//! - How documents, references and lookup documents map onto store keys

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod events;
pub mod index;
pub mod mapper;
pub mod persist;
pub mod populate;

pub use document::{Document, Slot};
pub use events::{EventBus, MapperEvent};
pub use index::{IndexAction, IndexOperation, IndexRecord, IndexSnapshot, IndexValue, IndexWriter};
pub use mapper::{
    FindOptions, FindResult, Found, Ids, Mapper, MapperConfig, ModelRegistry, CONFIG_FILE_NAME,
};
pub use persist::{Persistable, RemoveOptions, SaveOptions};
pub use populate::{FetchMemo, Populate};
