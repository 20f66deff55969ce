//! Schema compiler
//!
//! `SchemaBuilder` collects field descriptors, options and hooks, and
//! `compile` turns them into a `Schema`:
//!
//! 1. Every descriptor becomes a node of the field tree.
//! 2. References are recorded by dotted path, also through one array level.
//! 3. Indexed string/number leaves are recorded by dotted path with a
//!    derived name (explicit name, else the field name, singularized for
//!    array indexes) and kind (`Array` inside an array, else `Single`).
//! 4. Statics and methods are collected by name.
//! 5. The key field is resolved; `id` is synthesized when none is marked.
//!
//! Anything inconsistent fails with `Error::InvalidSchema`.

use serde_json::Value;
use settee_core::{Error, FieldPath, KeyPolicy, Result};
use std::collections::BTreeMap;
use tracing::debug;

use crate::descriptor::{parse_fields, Descriptor, IndexOption};
use crate::hooks::{HookQueue, Hookable};
use crate::inflect::singularize;
use crate::node::{MethodFn, NodeKind, TypeNode};
use crate::primitive::PrimitiveType;
use crate::schema::{IndexKind, IndexSpec, RefSpec, Schema, SchemaOptions, SerializeOptions};
use crate::tree::{FieldNode, FieldTree};

/// Name of the synthesized key field
pub const DEFAULT_KEY_FIELD: &str = "id";

/// Collects everything needed to compile a schema
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<(String, Descriptor)>,
    options: SchemaOptions,
    hooks: HookQueue,
}

impl SchemaBuilder {
    /// Builder for model `name`
    pub fn new(name: impl Into<String>) -> Self {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            options: SchemaOptions::default(),
            hooks: HookQueue::new(),
        }
    }

    /// Builder from a JSON object descriptor
    ///
    /// `is_model` answers whether a type marker names a registered model.
    pub fn from_json(
        name: impl Into<String>,
        descriptor: &Value,
        is_model: &dyn Fn(&str) -> bool,
    ) -> Result<Self> {
        let mut builder = SchemaBuilder::new(name);
        builder.fields = parse_fields(descriptor, is_model)?;
        Ok(builder)
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add or replace field `name`
    pub fn field(mut self, name: impl Into<String>, descriptor: Descriptor) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = descriptor,
            None => self.fields.push((name, descriptor)),
        }
        self
    }

    /// Replace all schema options
    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    /// Use field `name` as the document key
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.options.key_field = Some(name.into());
        self
    }

    /// Prefix of full store keys
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.key_prefix = Some(prefix.into());
        self
    }

    /// Suffix of full store keys
    pub fn key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.options.key_suffix = Some(suffix.into());
        self
    }

    /// Whether new documents get a generated key
    pub fn generate_key(mut self, generate: bool) -> Self {
        self.options.generate_key = generate;
        self
    }

    /// Key part separator for this model
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.options.delimiter = Some(delimiter.into());
        self
    }

    /// Defaults of `to_object`
    pub fn to_object(mut self, options: SerializeOptions) -> Self {
        self.options.to_object = options;
        self
    }

    /// Defaults of `to_json`
    pub fn to_json(mut self, options: SerializeOptions) -> Self {
        self.options.to_json = options;
        self
    }

    /// Compile into a schema
    ///
    /// `default_delimiter` applies when the builder set none.
    pub fn compile(self, default_delimiter: &str) -> Result<Schema> {
        let SchemaBuilder {
            name,
            fields,
            options,
            hooks,
        } = self;

        if name.is_empty() {
            return Err(Error::InvalidSchema("model name must not be empty".into()));
        }

        let mut compiler = Compiler::default();
        let mut tree = compiler.tree(&FieldPath::root(), fields, 0)?;
        compiler.check_aliases(&tree)?;

        let field = compiler.key_field(&mut tree, options.key_field.as_deref())?;
        let delimiter = options
            .delimiter
            .clone()
            .unwrap_or_else(|| default_delimiter.to_string());
        if delimiter.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "model {}: delimiter must not be empty",
                name
            )));
        }
        let key = KeyPolicy {
            field,
            prefix: options.key_prefix.clone(),
            suffix: options.key_suffix.clone(),
            generate: options.generate_key,
            delimiter,
        };

        debug!(
            target: "settee::schema",
            model = %name,
            key_field = %key.field,
            refs = compiler.refs.len(),
            indexes = compiler.indexes.len(),
            "compiled schema"
        );

        Ok(Schema {
            name,
            tree,
            key,
            refs: compiler.refs,
            indexes: compiler.indexes,
            statics: compiler.statics,
            methods: compiler.methods,
            hooks,
            options,
        })
    }
}

impl Hookable for SchemaBuilder {
    fn hook_queue(&mut self) -> &mut HookQueue {
        &mut self.hooks
    }
}

fn invalid(path: &FieldPath, msg: &str) -> Error {
    Error::InvalidSchema(format!("{}: {}", path, msg))
}

#[derive(Default)]
struct Compiler {
    refs: BTreeMap<FieldPath, RefSpec>,
    indexes: BTreeMap<FieldPath, IndexSpec>,
    statics: BTreeMap<String, Value>,
    methods: BTreeMap<String, MethodFn>,
    aliases: Vec<(FieldPath, FieldPath)>,
    marked_keys: Vec<String>,
}

impl Compiler {
    /// `depth` counts the arrays enclosing `base`
    fn tree(
        &mut self,
        base: &FieldPath,
        fields: Vec<(String, Descriptor)>,
        depth: usize,
    ) -> Result<FieldTree> {
        let mut tree = FieldTree::new();
        for (name, descriptor) in fields {
            let path = base.clone().key(name.as_str());
            if name.is_empty() || name.contains('.') || name.contains('[') {
                return Err(invalid(&path, "invalid field name"));
            }
            if tree.contains(&name) {
                return Err(invalid(&path, "duplicate field"));
            }
            let node = self.node(&path, descriptor, depth)?;
            tree.insert(name, node);
        }
        Ok(tree)
    }

    fn node(&mut self, path: &FieldPath, descriptor: Descriptor, depth: usize) -> Result<FieldNode> {
        let top_level = path.len() == 1 && depth == 0;
        let name = path.last_key().unwrap_or_default().to_string();

        let node = match descriptor {
            Descriptor::Scalar(t, spec) => {
                if spec.key {
                    if !top_level {
                        return Err(invalid(path, "key field must be a top-level field"));
                    }
                    if !t.is_key_type() {
                        return Err(invalid(path, "key field must be a String or Number"));
                    }
                    self.marked_keys.push(name);
                }
                if let Some(index) = spec.index {
                    self.index(path, t, index, depth)?;
                }
                TypeNode {
                    kind: NodeKind::Scalar(t),
                    options: spec.options,
                }
            }
            Descriptor::Reference(model, spec) => {
                if spec.key || spec.index.is_some() {
                    return Err(invalid(path, "a reference cannot be the key or indexed"));
                }
                if depth > 1 {
                    return Err(invalid(path, "references nest at most one array deep"));
                }
                self.refs.insert(
                    path.clone(),
                    RefSpec {
                        model: model.clone(),
                        array: depth > 0,
                    },
                );
                TypeNode {
                    kind: NodeKind::Reference(model),
                    options: spec.options,
                }
            }
            Descriptor::Nested(fields) => {
                return Ok(FieldNode::Tree(self.tree(path, fields, depth)?));
            }
            Descriptor::ArrayOf(element) => {
                let element = self.node(path, *element, depth + 1)?;
                return Ok(FieldNode::ArrayOf(Box::new(element)));
            }
            Descriptor::Virtual(get, set) => {
                if depth > 0 {
                    return Err(invalid(path, "virtual fields cannot live inside arrays"));
                }
                TypeNode::new(NodeKind::Virtual { get, set })
            }
            Descriptor::Static(value) => {
                if !top_level {
                    return Err(invalid(path, "statics must be top-level"));
                }
                self.statics.insert(name, value.clone());
                TypeNode::new(NodeKind::Static(value))
            }
            Descriptor::Method(body) => {
                if !top_level {
                    return Err(invalid(path, "methods must be top-level"));
                }
                self.methods.insert(name, body.clone());
                TypeNode::new(NodeKind::Method(body))
            }
            Descriptor::Alias(target) => {
                if depth > 0 {
                    return Err(invalid(path, "aliases cannot live inside arrays"));
                }
                let target: FieldPath = target
                    .parse()
                    .map_err(|e| invalid(path, &format!("bad alias target: {}", e)))?;
                self.aliases.push((path.clone(), target.clone()));
                TypeNode::new(NodeKind::Alias(target))
            }
        };
        Ok(FieldNode::Leaf(node))
    }

    fn index(
        &mut self,
        path: &FieldPath,
        t: PrimitiveType,
        option: IndexOption,
        depth: usize,
    ) -> Result<()> {
        if !t.is_indexable() {
            return Err(invalid(path, "only String and Number fields can be indexed"));
        }
        if depth > 1 {
            return Err(invalid(path, "indexed values nest at most one array deep"));
        }
        let derived = if depth > 0 {
            IndexKind::Array
        } else {
            IndexKind::Single
        };
        let kind = option.kind.unwrap_or(derived);
        if kind != derived {
            return Err(invalid(path, "index type does not match the field shape"));
        }
        let field = path.last_key().unwrap_or_default();
        let name = option.name.unwrap_or_else(|| match kind {
            IndexKind::Array => singularize(field),
            IndexKind::Single => field.to_string(),
        });
        if self.indexes.values().any(|spec| spec.name == name) {
            return Err(invalid(path, &format!("duplicate index name '{}'", name)));
        }
        self.indexes.insert(path.clone(), IndexSpec { name, kind });
        Ok(())
    }

    fn check_aliases(&self, tree: &FieldTree) -> Result<()> {
        for (alias, target) in &self.aliases {
            let ok = match tree.resolve(target) {
                Some(FieldNode::Leaf(node)) => node.is_stored(),
                Some(_) => true,
                None => false,
            };
            if !ok {
                return Err(invalid(alias, &format!("alias target {} is not a stored field", target)));
            }
        }
        Ok(())
    }

    fn key_field(&self, tree: &mut FieldTree, configured: Option<&str>) -> Result<String> {
        let field = match (configured, self.marked_keys.as_slice()) {
            (Some(f), []) => f.to_string(),
            (Some(f), [marked]) if marked == f => f.to_string(),
            (None, [marked]) => marked.clone(),
            (None, []) => DEFAULT_KEY_FIELD.to_string(),
            _ => {
                return Err(Error::InvalidSchema(
                    "more than one key field declared".into(),
                ))
            }
        };

        match tree.get(&field) {
            None => {
                tree.insert(
                    field.as_str(),
                    FieldNode::Leaf(TypeNode::new(NodeKind::Scalar(PrimitiveType::String))),
                );
            }
            Some(FieldNode::Leaf(TypeNode {
                kind: NodeKind::Scalar(t),
                ..
            })) if t.is_key_type() => {}
            Some(_) => {
                return Err(Error::InvalidSchema(format!(
                    "key field {} must be a String or Number",
                    field
                )))
            }
        }
        Ok(field)
    }
}
