//! Document runtime
//!
//! A `Document` is one instance of a model: the shared compiled schema plus
//! an exclusively owned table of field values. Every assignment goes
//! through the field's type node; a rejected value leaves the field as it
//! was and `set` reports `false` instead of failing.
//!
//! ## Field classes
//!
//! | Field | `get` | `set` |
//! |-------|-------|-------|
//! | scalar / reference | stored value, through the getter | setter, coercion, enum, validator |
//! | nested object | plain object | merged field by field |
//! | alias | target's value | forwarded to the target |
//! | virtual | computed | virtual setter, if any |
//! | static | schema constant | rejected |
//! | method | `None` | rejected |
//!
//! Paths that run past a populated reference (`author.name`) are forwarded
//! to the referenced document.

mod serialize;
pub(crate) mod slot;

pub use slot::Slot;

use serde_json::Value;
use settee_core::{key_to_string, Cas, Error, FieldPath, Result};
use settee_schema::{FieldAccess, FieldNode, NodeKind, Schema};
use std::sync::Arc;

use crate::index::{self, IndexSnapshot};
use slot::{Admit, Table};

/// One instance of a model
#[derive(Debug, Clone)]
pub struct Document {
    schema: Arc<Schema>,
    table: Table,
    cas: Option<Cas>,
    prior_index: IndexSnapshot,
}

impl Document {
    /// New, unsaved document from plain data
    ///
    /// Fields are admitted one by one; rejected values are dropped. Readonly
    /// fields accept their initial value. Absent fields get their default,
    /// and a key is generated when the schema asks for one.
    pub fn new(schema: Arc<Schema>, data: Value) -> Self {
        let mut obj = match data {
            Value::Object(obj) => obj,
            _ => Default::default(),
        };
        // Nested objects go through assignment so their aliases and
        // virtuals are applied.
        let nested: Vec<(String, Value)> = schema
            .tree()
            .iter()
            .filter(|(_, node)| matches!(node, FieldNode::Tree(_)))
            .filter_map(|(name, _)| obj.remove(name).map(|value| (name.to_string(), value)))
            .collect();
        let (table, rest) = slot::build_table(schema.tree(), obj, Admit::Checked);
        let mut doc = Document {
            schema: Arc::clone(&schema),
            table,
            cas: None,
            prior_index: IndexSnapshot::new(),
        };

        for (name, value) in nested.into_iter().chain(rest) {
            if !value.is_null() {
                doc.assign(&FieldPath::root().key(name), value, true);
            }
        }
        slot::apply_defaults(schema.tree(), &mut doc.table);

        let policy = schema.key_policy();
        if policy.generate && !doc.table.contains_key(&policy.field) {
            let generated = Value::String(uuid::Uuid::new_v4().to_string());
            let built = schema
                .tree()
                .get(&policy.field)
                .and_then(|node| slot::build_slot(node, generated, Admit::Checked));
            if let Some(built) = built {
                doc.table.insert(policy.field.clone(), built);
            }
        }

        doc.prior_index = doc.index_snapshot();
        doc
    }

    /// Document read from the store
    ///
    /// Values are taken as stored, without coercion or validation. A full
    /// key in the key field is shortened.
    pub fn from_stored(schema: Arc<Schema>, value: Value, cas: Option<Cas>) -> Self {
        let obj = match value {
            Value::Object(obj) => obj,
            _ => Default::default(),
        };
        let (mut table, _) = slot::build_table(schema.tree(), obj, Admit::Raw);

        let policy = schema.key_policy();
        if let Some(Slot::Value(Value::String(stored))) = table.get_mut(&policy.field) {
            *stored = policy.shorten(stored).to_string();
        }

        let mut doc = Document {
            schema,
            table,
            cas,
            prior_index: IndexSnapshot::new(),
        };
        doc.prior_index = doc.index_snapshot();
        doc
    }

    /// Compiled schema
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Model name
    pub fn model_name(&self) -> &str {
        self.schema.name()
    }

    /// CAS of the last read or write, `None` if never stored
    pub fn cas(&self) -> Option<Cas> {
        self.cas
    }

    pub(crate) fn set_cas(&mut self, cas: Option<Cas>) {
        self.cas = cas;
    }

    /// Whether the document was read from or written to the store
    pub fn is_stored(&self) -> bool {
        self.cas.is_some()
    }

    // =========================================================================
    // Field access
    // =========================================================================

    /// Value at `path`, `None` when unset or the path is invalid
    pub fn get(&self, path: &str) -> Option<Value> {
        let path: FieldPath = path.parse().ok()?;
        self.get_path(&path)
    }

    /// Value at a parsed path
    pub fn get_path(&self, path: &FieldPath) -> Option<Value> {
        let render = |d: &Document| d.to_object();
        match self.schema.node(path) {
            Some(FieldNode::Leaf(leaf)) => match &leaf.kind {
                NodeKind::Alias(target) => self.get_path(target),
                NodeKind::Virtual { get, .. } => Some(get(self)),
                NodeKind::Static(value) => Some(value.clone()),
                NodeKind::Method(_) => None,
                NodeKind::Scalar(_) | NodeKind::Reference(_) => {
                    slot::slot_at(&self.table, path).map(|s| match s {
                        Slot::Value(v) => leaf.present(v.clone()),
                        other => other.to_value(&render),
                    })
                }
            },
            Some(_) => slot::slot_at(&self.table, path).map(|s| s.to_value(&render)),
            None => {
                let (at, rest) = self.split_at_reference(path)?;
                match slot::slot_at(&self.table, &at)? {
                    Slot::Doc(doc) => doc.get_path(&rest),
                    _ => None,
                }
            }
        }
    }

    /// Assign `value` at `path`
    ///
    /// Returns false, leaving the document unchanged, when the path is
    /// invalid or the value is rejected. `null` clears the field.
    pub fn set(&mut self, path: &str, value: Value) -> bool {
        match path.parse::<FieldPath>() {
            Ok(path) => self.assign(&path, value, false),
            Err(_) => false,
        }
    }

    /// Assign every field of an object
    ///
    /// Returns true only if every field was accepted.
    pub fn set_all(&mut self, data: Value) -> bool {
        let Value::Object(obj) = data else {
            return false;
        };
        let mut all = true;
        for (name, value) in obj {
            all &= self.assign(&FieldPath::root().key(name), value, false);
        }
        all
    }

    pub(crate) fn assign(&mut self, path: &FieldPath, value: Value, constructing: bool) -> bool {
        let schema = Arc::clone(&self.schema);
        let Some(node) = schema.node(path) else {
            return self.assign_through_reference(path, value, constructing);
        };
        match node {
            FieldNode::Leaf(leaf) => match &leaf.kind {
                NodeKind::Alias(target) => self.assign(target, value, constructing),
                NodeKind::Virtual { set: Some(setter), .. } => {
                    setter(self, value);
                    true
                }
                NodeKind::Virtual { set: None, .. } | NodeKind::Static(_) | NodeKind::Method(_) => {
                    false
                }
                NodeKind::Scalar(_) | NodeKind::Reference(_) => {
                    self.assign_stored(path, node, value, constructing)
                }
            },
            FieldNode::Tree(_) => match value {
                Value::Object(obj) => {
                    let mut all = true;
                    for (name, child) in obj {
                        all &= self.assign(&path.clone().key(name), child, constructing);
                    }
                    all
                }
                Value::Null => slot::clear_slot(&mut self.table, path),
                _ => false,
            },
            FieldNode::ArrayOf(_) => self.assign_stored(path, node, value, constructing),
        }
    }

    fn assign_stored(
        &mut self,
        path: &FieldPath,
        node: &FieldNode,
        value: Value,
        constructing: bool,
    ) -> bool {
        let readonly = node.field_options().map_or(false, |o| o.readonly);
        if readonly && !constructing {
            return false;
        }
        if value.is_null() {
            return slot::clear_slot(&mut self.table, path);
        }
        match slot::build_slot(node, value, Admit::Checked) {
            Some(built) => slot::put_slot(&mut self.table, path, built),
            None => false,
        }
    }

    fn assign_through_reference(&mut self, path: &FieldPath, value: Value, constructing: bool) -> bool {
        let Some((at, rest)) = self.split_at_reference(path) else {
            return false;
        };
        match slot::slot_at_mut(&mut self.table, &at) {
            Some(Slot::Doc(doc)) => doc.assign(&rest, value, constructing),
            _ => false,
        }
    }

    /// Split a path running past a reference field into the reference
    /// address and the remainder
    fn split_at_reference(&self, path: &FieldPath) -> Option<(FieldPath, FieldPath)> {
        let segments = path.segments();
        (1..segments.len()).find_map(|i| {
            let head = FieldPath::from_segments(segments[..i].to_vec());
            let is_ref = self.schema.leaf(&head).and_then(|l| l.reference()).is_some();
            is_ref.then(|| (head, FieldPath::from_segments(segments[i..].to_vec())))
        })
    }

    // =========================================================================
    // References
    // =========================================================================

    /// Place a document in the reference field at `path`
    ///
    /// The field must be a reference to `doc`'s model. For array
    /// references `path` addresses an existing element (`readers[1]`).
    pub fn set_reference(&mut self, path: &str, doc: Document) -> bool {
        let Ok(path) = path.parse::<FieldPath>() else {
            return false;
        };
        match self.schema.leaf(&path).and_then(|l| l.reference()) {
            Some(model) if model == doc.model_name() => {
                slot::put_slot(&mut self.table, &path, Slot::Doc(Box::new(doc)))
            }
            _ => false,
        }
    }

    /// Append a document to the array reference field at `path`
    pub fn push_reference(&mut self, path: &str, doc: Document) -> bool {
        let Ok(path) = path.parse::<FieldPath>() else {
            return false;
        };
        let model = match self.schema.node(&path) {
            Some(FieldNode::ArrayOf(element)) => element.as_leaf().and_then(|l| l.reference()),
            _ => None,
        };
        if model != Some(doc.model_name()) {
            return false;
        }
        if slot::slot_at(&self.table, &path).is_none()
            && !slot::put_slot(&mut self.table, &path, Slot::List(Vec::new()))
        {
            return false;
        }
        match slot::slot_at_mut(&mut self.table, &path) {
            Some(Slot::List(items)) => {
                items.push(Slot::Doc(Box::new(doc)));
                true
            }
            _ => false,
        }
    }

    /// Populated document at `path`
    pub fn reference(&self, path: &str) -> Option<&Document> {
        let path: FieldPath = path.parse().ok()?;
        match slot::slot_at(&self.table, &path)? {
            Slot::Doc(doc) => Some(doc.as_ref()),
            _ => None,
        }
    }

    /// Populated documents under a reference path, in positional order
    ///
    /// `comments.author` yields the author of every comment that has been
    /// populated.
    pub fn references(&self, path: &str) -> Vec<&Document> {
        let Ok(path) = path.parse::<FieldPath>() else {
            return Vec::new();
        };
        slot::leaf_slots(&self.table, &path)
            .into_iter()
            .filter_map(|(_, s)| match s {
                Slot::Doc(doc) => Some(doc.as_ref()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn leaf_slots(&self, path: &FieldPath) -> Vec<(FieldPath, &Slot)> {
        slot::leaf_slots(&self.table, path)
    }

    pub(crate) fn leaf_slots_mut(&mut self, path: &FieldPath) -> Vec<(FieldPath, &mut Slot)> {
        slot::leaf_slots_mut(&mut self.table, path)
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Short document key
    pub fn key(&self) -> Option<String> {
        self.document_key(false)
    }

    /// Document key, short or expanded with the schema's prefix and suffix
    pub fn document_key(&self, full: bool) -> Option<String> {
        let policy = self.schema.key_policy();
        let raw = match self.table.get(&policy.field)? {
            Slot::Value(v) => key_to_string(v)?,
            _ => return None,
        };
        let short = policy.shorten(&raw);
        Some(if full {
            policy.expand(short)
        } else {
            short.to_string()
        })
    }

    /// Full store key, or `InvalidKey` when the key field is unset
    pub fn full_key(&self) -> Result<String> {
        self.document_key(true).ok_or_else(|| {
            Error::InvalidKey(format!(
                "{} document has no value in key field '{}'",
                self.model_name(),
                self.schema.key_field()
            ))
        })
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Invoke the schema method `name`
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        let method = self.schema.method(name)?;
        Some(method(self, args))
    }

    /// Schema constant `name`
    pub fn static_value(&self, name: &str) -> Option<&Value> {
        self.schema.static_value(name)
    }

    // =========================================================================
    // Index snapshots
    // =========================================================================

    /// Indexed values as they are now
    pub fn index_snapshot(&self) -> IndexSnapshot {
        index::snapshot(&self.schema, |path| {
            self.leaf_slots(path)
                .into_iter()
                .filter_map(|(_, s)| match s {
                    Slot::Value(v) => Some(v.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Indexed values as of the last read or save
    pub fn prior_index(&self) -> &IndexSnapshot {
        &self.prior_index
    }

    pub(crate) fn refresh_prior_index(&mut self) {
        self.prior_index = self.index_snapshot();
    }
}

impl FieldAccess for Document {
    fn model_name(&self) -> &str {
        Document::model_name(self)
    }

    fn get(&self, path: &str) -> Option<Value> {
        Document::get(self, path)
    }

    fn set(&mut self, path: &str, value: Value) -> bool {
        Document::set(self, path, value)
    }

    fn key(&self) -> Option<String> {
        Document::key(self)
    }

    fn to_object(&self) -> Value {
        Document::to_object(self)
    }
}
