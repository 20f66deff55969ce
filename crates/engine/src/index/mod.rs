//! Secondary lookup documents
//!
//! Every declared index maps one field value to the key of the document
//! holding it. A document keeps a snapshot of its indexed values as of its
//! last read or save; diffing that snapshot against the live values tells
//! the persistence layer which lookup documents to write and which to drop.

mod diff;
mod writer;

pub use diff::{diff, removal_ops, IndexAction, IndexOperation};
pub use writer::IndexWriter;

use serde_json::Value;
use settee_core::{index_text, FieldPath};
use settee_schema::{IndexKind, Schema};
use std::collections::BTreeMap;

/// Indexed value of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexValue {
    /// Field unset
    Null,
    /// Single-kind value
    One(String),
    /// Array-kind values, sorted and deduplicated
    Many(Vec<String>),
}

impl IndexValue {
    /// Values as a slice; empty for `Null`
    pub fn values(&self) -> &[String] {
        match self {
            IndexValue::Null => &[],
            IndexValue::One(v) => std::slice::from_ref(v),
            IndexValue::Many(vs) => vs,
        }
    }
}

/// One index of a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Index name
    pub name: String,
    /// Schema path of the indexed field
    pub path: FieldPath,
    /// Value at snapshot time
    pub value: IndexValue,
}

/// Index records by index name
pub type IndexSnapshot = BTreeMap<String, IndexRecord>;

/// Build the snapshot of every declared index
///
/// `values` yields the raw values stored under a schema path, one per
/// array element for paths that cross an array.
pub(crate) fn snapshot<F>(schema: &Schema, values: F) -> IndexSnapshot
where
    F: Fn(&FieldPath) -> Vec<Value>,
{
    schema
        .indexes()
        .iter()
        .map(|(path, spec)| {
            let raw = values(path);
            let texts = raw.iter().filter_map(index_text);
            let value = match spec.kind {
                IndexKind::Single => texts.into_iter().next().map_or(IndexValue::Null, IndexValue::One),
                IndexKind::Array => {
                    let mut all: Vec<String> = texts.collect();
                    all.sort();
                    all.dedup();
                    IndexValue::Many(all)
                }
            };
            let record = IndexRecord {
                name: spec.name.clone(),
                path: path.clone(),
                value,
            };
            (spec.name.clone(), record)
        })
        .collect()
}
