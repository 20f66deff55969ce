//! Document table storage
//!
//! The table mirrors the field tree: nested objects are `Tree`s, arrays
//! are `List`s, and a reference holds either the referenced key as a
//! `Value` or the referenced document itself once populated or assigned.

use serde_json::{Map, Value};
use settee_core::{FieldPath, PathSegment};
use settee_schema::{FieldNode, FieldTree};
use std::collections::BTreeMap;

use super::Document;

/// Field name to slot
pub type Table = BTreeMap<String, Slot>;

/// One stored value
#[derive(Debug, Clone)]
pub enum Slot {
    /// Scalar, untyped value or reference key
    Value(Value),
    /// Nested object
    Tree(Table),
    /// Array
    List(Vec<Slot>),
    /// Referenced document
    Doc(Box<Document>),
}

impl Slot {
    /// Plain value, rendering documents with `render`
    pub(crate) fn to_value(&self, render: &dyn Fn(&Document) -> Value) -> Value {
        match self {
            Slot::Value(v) => v.clone(),
            Slot::Tree(table) => Value::Object(table_to_map(table, render)),
            Slot::List(items) => Value::Array(items.iter().map(|s| s.to_value(render)).collect()),
            Slot::Doc(doc) => render(doc.as_ref()),
        }
    }
}

pub(crate) fn table_to_map(table: &Table, render: &dyn Fn(&Document) -> Value) -> Map<String, Value> {
    table
        .iter()
        .map(|(k, slot)| (k.clone(), slot.to_value(render)))
        .collect()
}

/// How incoming values are admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admit {
    /// Through setter, coercion, enum and validator
    Checked,
    /// As stored; used for store reads
    Raw,
}

/// Build the slot for `value` under `node`
///
/// Returns `None` when the value does not fit. An array is rejected as a
/// whole if any element is.
pub(crate) fn build_slot(node: &FieldNode, value: Value, admit: Admit) -> Option<Slot> {
    match node {
        FieldNode::Leaf(leaf) => match admit {
            Admit::Checked => leaf.accept(value).map(Slot::Value),
            Admit::Raw => leaf.is_stored().then_some(Slot::Value(value)),
        },
        FieldNode::Tree(tree) => match value {
            Value::Object(obj) => Some(Slot::Tree(build_table(tree, obj, admit).0)),
            _ => None,
        },
        FieldNode::ArrayOf(element) => match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| build_slot(element, item, admit))
                .collect::<Option<Vec<_>>>()
                .map(Slot::List),
            _ => None,
        },
    }
}

/// Build a table from an object
///
/// Fields that are not stored fields of `tree` are returned untouched as
/// the second element. Nulls and rejected values are dropped.
pub(crate) fn build_table(
    tree: &FieldTree,
    mut obj: Map<String, Value>,
    admit: Admit,
) -> (Table, Map<String, Value>) {
    let mut table = Table::new();
    for (name, node) in tree.iter() {
        let stored = match node {
            FieldNode::Leaf(leaf) => leaf.is_stored(),
            _ => true,
        };
        if !stored {
            continue;
        }
        match obj.remove(name) {
            None | Some(Value::Null) => {}
            Some(value) => {
                if let Some(slot) = build_slot(node, value, admit) {
                    table.insert(name.to_string(), slot);
                }
            }
        }
    }
    (table, obj)
}

/// Fill absent fields that declare a default
pub(crate) fn apply_defaults(tree: &FieldTree, table: &mut Table) {
    for (name, node) in tree.iter() {
        match node {
            FieldNode::Tree(subtree) => {
                let mut inner = match table.remove(name) {
                    Some(Slot::Tree(inner)) => inner,
                    Some(other) => {
                        table.insert(name.to_string(), other);
                        continue;
                    }
                    None => Table::new(),
                };
                apply_defaults(subtree, &mut inner);
                if !inner.is_empty() {
                    table.insert(name.to_string(), Slot::Tree(inner));
                }
            }
            _ => {
                if table.contains_key(name) {
                    continue;
                }
                let default = node.field_options().and_then(|o| o.default.as_ref());
                if let Some(slot) =
                    default.and_then(|d| build_slot(node, d.produce(), Admit::Checked))
                {
                    table.insert(name.to_string(), slot);
                }
            }
        }
    }
}

// =============================================================================
// Path access
// =============================================================================

/// Slot at `path`, without crossing into referenced documents
pub(crate) fn slot_at<'a>(table: &'a Table, path: &FieldPath) -> Option<&'a Slot> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = match first {
        PathSegment::Key(k) => table.get(k)?,
        PathSegment::Index(_) => return None,
    };
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Key(k), Slot::Tree(t)) => t.get(k)?,
            (PathSegment::Index(i), Slot::List(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable slot at `path`
pub(crate) fn slot_at_mut<'a>(table: &'a mut Table, path: &FieldPath) -> Option<&'a mut Slot> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = match first {
        PathSegment::Key(k) => table.get_mut(k)?,
        PathSegment::Index(_) => return None,
    };
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Key(k), Slot::Tree(t)) => t.get_mut(k)?,
            (PathSegment::Index(i), Slot::List(items)) => items.get_mut(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Store `slot` at `path`
///
/// Missing nested objects on the way are created. Array positions must
/// already exist.
pub(crate) fn put_slot(table: &mut Table, path: &FieldPath, slot: Slot) -> bool {
    put_in_table(table, path.segments(), slot)
}

fn put_in_table(table: &mut Table, segments: &[PathSegment], slot: Slot) -> bool {
    match segments {
        [PathSegment::Key(k)] => {
            table.insert(k.clone(), slot);
            true
        }
        [PathSegment::Key(k), rest @ ..] => {
            let child = match rest.first() {
                Some(PathSegment::Key(_)) => table
                    .entry(k.clone())
                    .or_insert_with(|| Slot::Tree(Table::new())),
                _ => match table.get_mut(k) {
                    Some(child) => child,
                    None => return false,
                },
            };
            put_in_slot(child, rest, slot)
        }
        _ => false,
    }
}

fn put_in_slot(target: &mut Slot, segments: &[PathSegment], slot: Slot) -> bool {
    match (target, segments.split_first()) {
        (Slot::Tree(table), Some((PathSegment::Key(_), _))) => put_in_table(table, segments, slot),
        (Slot::List(items), Some((PathSegment::Index(i), rest))) => match items.get_mut(*i) {
            Some(item) if rest.is_empty() => {
                *item = slot;
                true
            }
            Some(item) => put_in_slot(item, rest, slot),
            None => false,
        },
        _ => false,
    }
}

/// Remove the slot at `path`; array positions cannot be removed
pub(crate) fn clear_slot(table: &mut Table, path: &FieldPath) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };
    let Some(PathSegment::Key(name)) = path.segments().last() else {
        return false;
    };
    if parent.is_root() {
        table.remove(name);
        return true;
    }
    match slot_at_mut(table, &parent) {
        Some(Slot::Tree(inner)) => {
            inner.remove(name);
            true
        }
        _ => true,
    }
}

/// Leaf slots at a schema path, with their concrete addresses
///
/// Arrays on the way are expanded, and an array at the end yields its
/// elements, so `comments.author` visits `comments[0].author`,
/// `comments[1].author`, and `readers` visits `readers[0]`, `readers[1]`.
pub(crate) fn leaf_slots<'a>(table: &'a Table, path: &FieldPath) -> Vec<(FieldPath, &'a Slot)> {
    let mut out = Vec::new();
    if let Some((PathSegment::Key(first), rest)) = path.segments().split_first() {
        if let Some(slot) = table.get(first) {
            collect(slot, rest, FieldPath::root().key(first.as_str()), &mut out);
        }
    }
    out
}

fn collect<'a>(
    slot: &'a Slot,
    rest: &[PathSegment],
    at: FieldPath,
    out: &mut Vec<(FieldPath, &'a Slot)>,
) {
    match (slot, rest.split_first()) {
        (Slot::List(items), None) => {
            for (i, item) in items.iter().enumerate() {
                out.push((at.clone().index(i), item));
            }
        }
        (other, None) => out.push((at, other)),
        (Slot::Tree(t), Some((PathSegment::Key(k), tail))) => {
            if let Some(child) = t.get(k) {
                collect(child, tail, at.key(k.as_str()), out);
            }
        }
        (Slot::List(items), Some((PathSegment::Index(i), tail))) => {
            if let Some(item) = items.get(*i) {
                collect(item, tail, at.index(*i), out);
            }
        }
        (Slot::List(items), Some(_)) => {
            for (i, item) in items.iter().enumerate() {
                collect(item, rest, at.clone().index(i), out);
            }
        }
        _ => {}
    }
}

/// Mutable leaf slots at a schema path, with their concrete addresses
pub(crate) fn leaf_slots_mut<'a>(
    table: &'a mut Table,
    path: &FieldPath,
) -> Vec<(FieldPath, &'a mut Slot)> {
    let mut out = Vec::new();
    if let Some((PathSegment::Key(first), rest)) = path.segments().split_first() {
        if let Some(slot) = table.get_mut(first) {
            collect_mut(slot, rest, FieldPath::root().key(first.as_str()), &mut out);
        }
    }
    out
}

fn collect_mut<'a>(
    slot: &'a mut Slot,
    rest: &[PathSegment],
    at: FieldPath,
    out: &mut Vec<(FieldPath, &'a mut Slot)>,
) {
    match (slot, rest.split_first()) {
        (Slot::List(items), None) => {
            for (i, item) in items.iter_mut().enumerate() {
                out.push((at.clone().index(i), item));
            }
        }
        (other, None) => out.push((at, other)),
        (Slot::Tree(t), Some((PathSegment::Key(k), tail))) => {
            if let Some(child) = t.get_mut(k) {
                collect_mut(child, tail, at.key(k.as_str()), out);
            }
        }
        (Slot::List(items), Some((PathSegment::Index(i), tail))) => {
            if let Some(item) = items.get_mut(*i) {
                collect_mut(item, tail, at.index(*i), out);
            }
        }
        (Slot::List(items), Some(_)) => {
            for (i, item) in items.iter_mut().enumerate() {
                collect_mut(item, rest, at.clone().index(i), out);
            }
        }
        _ => {}
    }
}
