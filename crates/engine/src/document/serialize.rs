//! Plain-value output of a document
//!
//! `to_object` / `to_json` produce a nested `serde_json::Value` for
//! callers. `storage_value` produces what is written to the store: no
//! virtuals, populated references collapsed back to keys.

use serde_json::Value;
use settee_core::{minimize, set_at_path};
use settee_schema::{FieldNode, NodeKind, SerializeOptions};

use super::slot::{table_to_map, Slot};
use super::Document;

impl Document {
    /// Plain object using the schema's `to_object` defaults
    pub fn to_object(&self) -> Value {
        self.serialize(&self.schema.options().to_object, false)
    }

    /// Plain object with explicit options
    pub fn to_object_with(&self, options: &SerializeOptions) -> Value {
        self.serialize(options, false)
    }

    /// Plain object using the schema's `to_json` defaults
    pub fn to_json(&self) -> Value {
        self.serialize(&self.schema.options().to_json, true)
    }

    /// `to_json` with explicit options
    pub fn to_json_with(&self, options: &SerializeOptions) -> Value {
        self.serialize(options, true)
    }

    fn serialize(&self, options: &SerializeOptions, json: bool) -> Value {
        let render = |d: &Document| if json { d.to_json() } else { d.to_object() };
        let mut out = Value::Object(table_to_map(&self.table, &render));

        if options.virtuals {
            for path in self.schema.tree().leaf_paths() {
                if let Some(NodeKind::Virtual { get, .. }) = self.schema.leaf(&path).map(|l| &l.kind) {
                    set_at_path(&mut out, &path, get(self));
                }
            }
        }

        if options.expand_key {
            if let (Some(full), Value::Object(obj)) = (self.document_key(true), &mut out) {
                obj.insert(self.schema.key_field().to_string(), Value::String(full));
            }
        }

        if options.minimize {
            minimize(&mut out);
        }

        match &options.transform {
            Some(transform) => transform(self, out, json),
            None => out,
        }
    }

    /// Value written to the store
    ///
    /// Populated references are stored as the referenced key, expanded when
    /// `full_refs` is set. The key field holds the full key when `full_key`
    /// is set and the short key otherwise.
    pub fn storage_value(&self, full_key: bool, full_refs: bool, minimized: bool) -> Value {
        let render = |d: &Document| d.document_key(full_refs).map_or(Value::Null, Value::String);
        let mut obj = table_to_map(&self.table, &render);

        let field = self.schema.key_field();
        if full_key {
            if let Some(full) = self.document_key(true) {
                obj.insert(field.to_string(), Value::String(full));
            }
        } else if let Some(Value::String(_)) = obj.get(field) {
            if let Some(short) = self.document_key(false) {
                obj.insert(field.to_string(), Value::String(short));
            }
        }

        let mut out = Value::Object(obj);
        if minimized {
            minimize(&mut out);
        }
        out
    }

    /// Fields the schema stores, for diagnostics
    pub(crate) fn stored_field_count(&self) -> usize {
        self.schema
            .tree()
            .iter()
            .filter(|(_, node)| match node {
                FieldNode::Leaf(leaf) => leaf.is_stored(),
                _ => true,
            })
            .filter(|(name, _)| self.table.contains_key(*name))
            .count()
    }
}

impl Slot {
    /// Whether the slot holds a document not yet written to the store
    pub(crate) fn is_unsaved_doc(&self) -> bool {
        matches!(self, Slot::Doc(doc) if !doc.is_stored())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use settee_schema::{Descriptor, FieldAccess, SchemaBuilder};
    use std::sync::Arc;

    fn user() -> Arc<settee_schema::Schema> {
        let schema = SchemaBuilder::new("User")
            .field("name", Descriptor::string())
            .field("profile", Descriptor::nested([("bio", Descriptor::string())]))
            .field(
                "shout",
                Descriptor::virtual_field(|d| {
                    let name = d.get("name").and_then(|v| v.as_str().map(str::to_uppercase));
                    name.map_or(Value::Null, Value::String)
                }),
            )
            .key_prefix("user")
            .compile("_")
            .unwrap();
        Arc::new(schema)
    }

    #[test]
    fn test_to_object_minimizes_and_skips_virtuals() {
        let doc = Document::new(user(), json!({"id": "1", "name": "ann", "profile": {}}));
        assert_eq!(doc.to_object(), json!({"id": "1", "name": "ann"}));
    }

    #[test]
    fn test_virtuals_and_key_expansion_on_request() {
        let doc = Document::new(user(), json!({"id": "1", "name": "ann"}));
        let options = SerializeOptions {
            virtuals: true,
            expand_key: true,
            ..SerializeOptions::default()
        };
        assert_eq!(
            doc.to_object_with(&options),
            json!({"id": "user_1", "name": "ann", "shout": "ANN"})
        );
    }

    #[test]
    fn test_transform_replaces_output_and_sees_json_flag() {
        let doc = Document::new(user(), json!({"id": "1", "name": "ann"}));
        let options = SerializeOptions {
            transform: Some(Arc::new(|_: &dyn FieldAccess, _: Value, json: bool| json!({ "json": json }))),
            ..SerializeOptions::default()
        };
        assert_eq!(doc.to_object_with(&options), json!({"json": false}));
        assert_eq!(doc.to_json_with(&options), json!({"json": true}));
    }

    #[test]
    fn test_storage_value_key_forms() {
        let doc = Document::new(user(), json!({"id": "user_1", "name": "ann"}));
        assert_eq!(doc.storage_value(false, false, true), json!({"id": "1", "name": "ann"}));
        assert_eq!(doc.storage_value(true, false, true), json!({"id": "user_1", "name": "ann"}));
        assert_eq!(doc.stored_field_count(), 2);
    }
}
