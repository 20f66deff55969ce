//! Compiled schemas
//!
//! A `Schema` is immutable once compiled and shared (`Arc<Schema>`) by every
//! document of its model. Besides the field tree it carries the lookup
//! tables the runtime needs without walking the tree: declared references
//! and declared indexes by path, statics and methods by name.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use settee_core::{FieldPath, KeyPolicy};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::hooks::HookQueue;
use crate::node::{FieldAccess, MethodFn, TypeNode};
use crate::tree::{FieldNode, FieldTree};

/// Shape of an indexed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// One value per document
    Single,
    /// A set of values per document
    Array,
}

impl IndexKind {
    /// Parse `"single"` / `"array"`, any case
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Some(IndexKind::Single),
            "array" => Some(IndexKind::Array),
            _ => None,
        }
    }
}

/// A declared secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name, part of every index document key
    pub name: String,
    /// Shape of the indexed value
    pub kind: IndexKind,
}

/// A declared reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    /// Referenced model
    pub model: String,
    /// The path crosses an array, so one document holds many references
    pub array: bool,
}

/// Final step of serialization
///
/// Receives the document, the serialized value and whether the `to_json`
/// defaults were used. Its return value replaces the output.
pub type TransformFn = Arc<dyn Fn(&dyn FieldAccess, Value, bool) -> Value + Send + Sync>;

/// Serialization options
#[derive(Clone)]
pub struct SerializeOptions {
    /// Include virtual fields
    pub virtuals: bool,
    /// Replace the short key with the full store key
    pub expand_key: bool,
    /// Drop empty branches
    pub minimize: bool,
    /// Applied last
    pub transform: Option<TransformFn>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            virtuals: false,
            expand_key: false,
            minimize: true,
            transform: None,
        }
    }
}

impl fmt::Debug for SerializeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializeOptions")
            .field("virtuals", &self.virtuals)
            .field("expand_key", &self.expand_key)
            .field("minimize", &self.minimize)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Schema-level options
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Name of the key field; `id` is synthesized when no field is marked
    pub key_field: Option<String>,
    /// Prefix of full store keys
    pub key_prefix: Option<String>,
    /// Suffix of full store keys
    pub key_suffix: Option<String>,
    /// Generate a key for new documents that lack one
    pub generate_key: bool,
    /// Key part separator; the mapper's delimiter when absent
    pub delimiter: Option<String>,
    /// Defaults of `to_object`
    pub to_object: SerializeOptions,
    /// Defaults of `to_json`
    pub to_json: SerializeOptions,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        SchemaOptions {
            key_field: None,
            key_prefix: None,
            key_suffix: None,
            generate_key: true,
            delimiter: None,
            to_object: SerializeOptions::default(),
            to_json: SerializeOptions::default(),
        }
    }
}

/// A compiled model schema
pub struct Schema {
    pub(crate) name: String,
    pub(crate) tree: FieldTree,
    pub(crate) key: KeyPolicy,
    pub(crate) refs: BTreeMap<FieldPath, RefSpec>,
    pub(crate) indexes: BTreeMap<FieldPath, IndexSpec>,
    pub(crate) statics: BTreeMap<String, Value>,
    pub(crate) methods: BTreeMap<String, MethodFn>,
    pub(crate) hooks: HookQueue,
    pub(crate) options: SchemaOptions,
}

impl Schema {
    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field tree
    pub fn tree(&self) -> &FieldTree {
        &self.tree
    }

    /// Document key policy
    pub fn key_policy(&self) -> &KeyPolicy {
        &self.key
    }

    /// Name of the key field
    pub fn key_field(&self) -> &str {
        &self.key.field
    }

    /// Declared references by path
    pub fn refs(&self) -> &BTreeMap<FieldPath, RefSpec> {
        &self.refs
    }

    /// Declared indexes by path
    pub fn indexes(&self) -> &BTreeMap<FieldPath, IndexSpec> {
        &self.indexes
    }

    /// Index declared under `name`
    pub fn index_named(&self, name: &str) -> Option<(&FieldPath, &IndexSpec)> {
        self.indexes.iter().find(|(_, spec)| spec.name == name)
    }

    /// Node addressed by `path`
    pub fn node(&self, path: &FieldPath) -> Option<&FieldNode> {
        self.tree.resolve(path)
    }

    /// Type node addressed by `path`, if it is a leaf
    pub fn leaf(&self, path: &FieldPath) -> Option<&TypeNode> {
        self.tree.leaf(path)
    }

    /// Reference paths, shallowest first
    pub fn ref_paths(&self) -> Vec<&FieldPath> {
        let mut paths: Vec<&FieldPath> = self.refs.keys().collect();
        paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        paths
    }

    /// Reference paths, deepest first
    pub fn ref_paths_deepest_first(&self) -> Vec<&FieldPath> {
        let mut paths = self.ref_paths();
        paths.reverse();
        paths
    }

    /// Declared reference whose path is `path` or its longest ancestor
    ///
    /// Used to split a population path such as `posts.author` into the
    /// reference to resolve (`posts`) and the remainder (`author`).
    pub fn ref_covering(&self, path: &FieldPath) -> Option<(&FieldPath, &RefSpec)> {
        self.refs
            .iter()
            .filter(|(p, _)| p.is_ancestor_of(path))
            .max_by_key(|(p, _)| p.len())
    }

    /// Static member `name`
    pub fn static_value(&self, name: &str) -> Option<&Value> {
        self.statics.get(name)
    }

    /// All static members
    pub fn statics(&self) -> &BTreeMap<String, Value> {
        &self.statics
    }

    /// Method `name`
    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    /// Names of all methods
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Lifecycle hooks
    pub fn hooks(&self) -> &HookQueue {
        &self.hooks
    }

    /// Schema options
    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("refs", &self.refs)
            .field("indexes", &self.indexes)
            .field("statics", &self.statics)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish()
    }
}
