//! Field descriptors
//!
//! A descriptor says what a field is before compilation. Descriptors are
//! built either with the constructors below:
//!
//! ```
//! use settee_schema::Descriptor;
//!
//! let email = Descriptor::string().index();
//! let tags = Descriptor::array_of(Descriptor::string()).index();
//! let author = Descriptor::reference("User");
//! ```
//!
//! or parsed from a JSON descriptor with [`Descriptor::from_json`]:
//!
//! ```text
//! {
//!   "name": "String",
//!   "email": { "type": "String", "index": true },
//!   "tags": ["String"],
//!   "author": "User",
//!   "profile": { "age": "Number" }
//! }
//! ```
//!
//! Closures (validators, getters, setters, virtuals, methods) have no JSON
//! form; attach them with the builder methods.

use serde_json::Value;
use settee_core::{Error, Result};
use std::fmt;
use std::sync::Arc;

use crate::node::{
    DefaultValue, FieldAccess, FieldOptions, MethodFn, VirtualGetFn, VirtualSetFn,
};
use crate::primitive::PrimitiveType;
use crate::schema::IndexKind;

/// Index request on a field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOption {
    /// Explicit index name; derived from the field name when absent
    pub name: Option<String>,
    /// Explicit kind; derived from the field shape when absent
    pub kind: Option<IndexKind>,
}

/// Options of a stored field (scalar or reference)
#[derive(Debug, Clone, Default)]
pub struct FieldSpec {
    /// Coercion and validation options
    pub options: FieldOptions,
    /// Secondary index request
    pub index: Option<IndexOption>,
    /// Marks the document-key field
    pub key: bool,
}

/// Uncompiled field description
#[derive(Clone)]
pub enum Descriptor {
    /// Primitive value
    Scalar(PrimitiveType, FieldSpec),
    /// Nested object with its own fields
    Nested(Vec<(String, Descriptor)>),
    /// Array of the wrapped element
    ArrayOf(Box<Descriptor>),
    /// Key of a document of the named model
    Reference(String, FieldSpec),
    /// Computed field
    Virtual(VirtualGetFn, Option<VirtualSetFn>),
    /// Schema-level constant
    Static(Value),
    /// Instance method
    Method(MethodFn),
    /// Another name for the field at the given dotted path
    Alias(String),
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Scalar(t, spec) => f.debug_tuple("Scalar").field(t).field(spec).finish(),
            Descriptor::Nested(fields) => f.debug_tuple("Nested").field(fields).finish(),
            Descriptor::ArrayOf(inner) => f.debug_tuple("ArrayOf").field(inner).finish(),
            Descriptor::Reference(m, spec) => {
                f.debug_tuple("Reference").field(m).field(spec).finish()
            }
            Descriptor::Virtual(_, set) => write!(f, "Virtual(settable: {})", set.is_some()),
            Descriptor::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Descriptor::Method(_) => f.write_str("Method(..)"),
            Descriptor::Alias(p) => f.debug_tuple("Alias").field(p).finish(),
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

impl Descriptor {
    /// Scalar of the given primitive type
    pub fn scalar(t: PrimitiveType) -> Self {
        Descriptor::Scalar(t, FieldSpec::default())
    }

    /// String field
    pub fn string() -> Self {
        Self::scalar(PrimitiveType::String)
    }

    /// Number field
    pub fn number() -> Self {
        Self::scalar(PrimitiveType::Number)
    }

    /// Boolean field
    pub fn boolean() -> Self {
        Self::scalar(PrimitiveType::Boolean)
    }

    /// Date field
    pub fn date() -> Self {
        Self::scalar(PrimitiveType::Date)
    }

    /// Untyped field
    pub fn mixed() -> Self {
        Self::scalar(PrimitiveType::Mixed)
    }

    /// Reference to a document of `model`
    pub fn reference(model: impl Into<String>) -> Self {
        Descriptor::Reference(model.into(), FieldSpec::default())
    }

    /// Array of `element`
    pub fn array_of(element: Descriptor) -> Self {
        Descriptor::ArrayOf(Box::new(element))
    }

    /// Nested object
    pub fn nested<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Descriptor)>,
    {
        Descriptor::Nested(fields.into_iter().map(|(k, d)| (k.into(), d)).collect())
    }

    /// Read-only computed field
    pub fn virtual_field<G>(get: G) -> Self
    where
        G: Fn(&dyn FieldAccess) -> Value + Send + Sync + 'static,
    {
        Descriptor::Virtual(Arc::new(get), None)
    }

    /// Computed field that also accepts writes
    pub fn virtual_field_with_setter<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&dyn FieldAccess) -> Value + Send + Sync + 'static,
        S: Fn(&mut dyn FieldAccess, Value) + Send + Sync + 'static,
    {
        Descriptor::Virtual(Arc::new(get), Some(Arc::new(set)))
    }

    /// Schema-level constant
    pub fn static_value(value: Value) -> Self {
        Descriptor::Static(value)
    }

    /// Instance method
    pub fn method<F>(body: F) -> Self
    where
        F: Fn(&dyn FieldAccess, &[Value]) -> Value + Send + Sync + 'static,
    {
        Descriptor::Method(Arc::new(body))
    }

    /// Alias of the field at `target`
    pub fn alias(target: impl Into<String>) -> Self {
        Descriptor::Alias(target.into())
    }
}

// =============================================================================
// Field options
// =============================================================================

impl Descriptor {
    /// Options of the stored field this descriptor describes
    ///
    /// Arrays forward to their element, so `array_of(string()).index()`
    /// indexes the elements.
    fn spec_mut(&mut self) -> Option<&mut FieldSpec> {
        match self {
            Descriptor::Scalar(_, spec) | Descriptor::Reference(_, spec) => Some(spec),
            Descriptor::ArrayOf(inner) => inner.spec_mut(),
            _ => None,
        }
    }

    fn with_spec(mut self, apply: impl FnOnce(&mut FieldSpec)) -> Self {
        if let Some(spec) = self.spec_mut() {
            apply(spec);
        }
        self
    }

    /// Fixed default value
    pub fn default_value(self, value: Value) -> Self {
        self.with_spec(|s| s.options.default = Some(DefaultValue::Value(value)))
    }

    /// Default computed per document
    pub fn default_with<F>(self, produce: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.with_spec(|s| s.options.default = Some(DefaultValue::Computed(Arc::new(produce))))
    }

    /// Restrict to the given values
    pub fn one_of<I: IntoIterator<Item = Value>>(self, values: I) -> Self {
        let values: Vec<Value> = values.into_iter().collect();
        self.with_spec(|s| s.options.one_of = Some(values))
    }

    /// Custom validator
    pub fn validate<F>(self, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.with_spec(|s| s.options.validator = Some(Arc::new(check)))
    }

    /// Transform applied on read
    pub fn getter<F>(self, map: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.with_spec(|s| s.options.getter = Some(Arc::new(map)))
    }

    /// Transform applied on write, before coercion
    pub fn setter<F>(self, map: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.with_spec(|s| s.options.setter = Some(Arc::new(map)))
    }

    /// Settable only at construction
    pub fn readonly(self) -> Self {
        self.with_spec(|s| s.options.readonly = true)
    }

    /// Skip lenient coercion
    pub fn strict(self) -> Self {
        self.with_spec(|s| s.options.strict = true)
    }

    /// Maintain a secondary index with a derived name
    pub fn index(self) -> Self {
        self.with_spec(|s| {
            s.index.get_or_insert_with(IndexOption::default);
        })
    }

    /// Maintain a secondary index under `name`
    pub fn index_named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with_spec(|s| s.index.get_or_insert_with(IndexOption::default).name = Some(name))
    }

    /// Force the index kind
    pub fn index_kind(self, kind: IndexKind) -> Self {
        self.with_spec(|s| s.index.get_or_insert_with(IndexOption::default).kind = Some(kind))
    }

    /// Use this field as the document key
    pub fn key(self) -> Self {
        self.with_spec(|s| s.key = true)
    }
}

// =============================================================================
// JSON descriptor parsing
// =============================================================================

impl Descriptor {
    /// Parse a JSON field descriptor
    ///
    /// `is_model` answers whether a marker names a registered model; such
    /// markers become references.
    pub fn from_json(value: &Value, is_model: &dyn Fn(&str) -> bool) -> Result<Descriptor> {
        match value {
            Value::String(marker) => parse_marker(marker, is_model),
            Value::Array(items) => match items.as_slice() {
                [element] => Ok(Descriptor::array_of(Descriptor::from_json(element, is_model)?)),
                _ => Err(Error::InvalidSchema(format!(
                    "array descriptor must have exactly one element, got {}",
                    items.len()
                ))),
            },
            Value::Object(obj) => {
                if let Some(ty) = obj.get("type").or_else(|| obj.get("Type")) {
                    let base = match obj.get("ref").and_then(Value::as_str) {
                        Some(model) => Descriptor::reference(model),
                        None => Descriptor::from_json(ty, is_model)?,
                    };
                    apply_json_options(base, obj)
                } else if let Some(target) = obj.get("alias") {
                    match target.as_str() {
                        Some(path) => Ok(Descriptor::alias(path)),
                        None => Err(Error::InvalidSchema("alias target must be a string".into())),
                    }
                } else if let Some(value) = obj.get("static") {
                    Ok(Descriptor::static_value(value.clone()))
                } else {
                    Ok(Descriptor::Nested(parse_fields(value, is_model)?))
                }
            }
            other => Err(Error::InvalidSchema(format!(
                "unsupported descriptor: {}",
                other
            ))),
        }
    }
}

/// Parse every field of a JSON object descriptor
pub fn parse_fields(
    value: &Value,
    is_model: &dyn Fn(&str) -> bool,
) -> Result<Vec<(String, Descriptor)>> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::InvalidSchema("descriptor must be an object".into()))?;
    obj.iter()
        .map(|(name, d)| Ok((name.clone(), Descriptor::from_json(d, is_model)?)))
        .collect()
}

fn parse_marker(marker: &str, is_model: &dyn Fn(&str) -> bool) -> Result<Descriptor> {
    if let Some(t) = PrimitiveType::from_marker(marker) {
        return Ok(Descriptor::scalar(t));
    }
    if is_model(marker) {
        return Ok(Descriptor::reference(marker));
    }
    Err(Error::InvalidSchema(format!("unknown type marker '{}'", marker)))
}

fn apply_json_options(mut desc: Descriptor, obj: &serde_json::Map<String, Value>) -> Result<Descriptor> {
    let flag = |name: &str| obj.get(name).and_then(Value::as_bool).unwrap_or(false);

    if let Some(default) = obj.get("default") {
        desc = desc.default_value(default.clone());
    }
    if let Some(allowed) = obj.get("enum") {
        let values = allowed
            .as_array()
            .ok_or_else(|| Error::InvalidSchema("enum must be an array".into()))?;
        desc = desc.one_of(values.iter().cloned());
    }
    if flag("readonly") {
        desc = desc.readonly();
    }
    if flag("strict") {
        desc = desc.strict();
    }
    if flag("key") {
        desc = desc.key();
    }
    if flag("index") {
        desc = desc.index();
    }
    if let Some(name) = obj.get("indexName").and_then(Value::as_str) {
        desc = desc.index_named(name);
    }
    if let Some(kind) = obj.get("indexType") {
        let kind = kind
            .as_str()
            .and_then(IndexKind::parse)
            .ok_or_else(|| Error::InvalidSchema(format!("invalid indexType {}", kind)))?;
        desc = desc.index_kind(kind);
    }
    Ok(desc)
}
