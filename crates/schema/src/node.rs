//! Type nodes: one compiled field
//!
//! A `TypeNode` is the vtable of a single field. Every closure a field can
//! carry (validator, getter, setter, virtual accessors, method body) is
//! resolved here once, at compile time, and shared by every document of
//! the schema.
//!
//! A node has exactly one classification, the `NodeKind`:
//!
//! | Kind | Stored in the document | Serialized |
//! |------|------------------------|------------|
//! | `Scalar` | yes | yes |
//! | `Reference` | key or populated document | yes |
//! | `Virtual` | no (computed) | only with `virtuals` |
//! | `Static` | no (lives on the schema) | no |
//! | `Method` | no (lives on the schema) | no |
//! | `Alias` | no (forwards to its target) | no |

use serde_json::Value;
use settee_core::{key_to_string, FieldPath};
use std::fmt;
use std::sync::Arc;

use crate::primitive::PrimitiveType;

/// Field-level access to a document
///
/// Virtual accessors, methods, transforms and hooks see documents through
/// this trait so the schema layer never depends on the document runtime.
pub trait FieldAccess: Send + Sync {
    /// Name of the model the document belongs to
    fn model_name(&self) -> &str;

    /// Current value at `path`, `None` when unset
    fn get(&self, path: &str) -> Option<Value>;

    /// Assign `value` at `path`
    ///
    /// Returns false when the value was rejected; the field is unchanged.
    fn set(&mut self, path: &str, value: Value) -> bool;

    /// Short document key, if one is set
    fn key(&self) -> Option<String>;

    /// Plain representation using the schema's `to_object` defaults
    fn to_object(&self) -> Value;
}

/// Accept or reject a candidate value
pub type ValidatorFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Rewrite a value on its way in or out
pub type MapFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Produce a default value at construction time
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Compute a virtual field from the document
pub type VirtualGetFn = Arc<dyn Fn(&dyn FieldAccess) -> Value + Send + Sync>;

/// Apply a value written to a virtual field
pub type VirtualSetFn = Arc<dyn Fn(&mut dyn FieldAccess, Value) + Send + Sync>;

/// Instance method body
pub type MethodFn = Arc<dyn Fn(&dyn FieldAccess, &[Value]) -> Value + Send + Sync>;

/// Default value of a field
#[derive(Clone)]
pub enum DefaultValue {
    /// Fixed value
    Value(Value),
    /// Computed per document
    Computed(DefaultFn),
}

impl DefaultValue {
    /// Materialize the default for a new document
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Options shared by stored fields
#[derive(Clone, Default)]
pub struct FieldOptions {
    /// Value used when the field is absent at construction
    pub default: Option<DefaultValue>,
    /// Allowed values, checked after coercion
    pub one_of: Option<Vec<Value>>,
    /// Custom check, run last
    pub validator: Option<ValidatorFn>,
    /// Applied to the stored value on `get`
    pub getter: Option<MapFn>,
    /// Applied to the incoming value before coercion
    pub setter: Option<MapFn>,
    /// Settable only at construction and from store reads
    pub readonly: bool,
    /// Skip lenient coercion
    pub strict: bool,
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOptions")
            .field("default", &self.default)
            .field("one_of", &self.one_of)
            .field("validator", &self.validator.is_some())
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("readonly", &self.readonly)
            .field("strict", &self.strict)
            .finish()
    }
}

/// Classification of a compiled field
#[derive(Clone)]
pub enum NodeKind {
    /// Plain stored value
    Scalar(PrimitiveType),
    /// Key of a document of the named model
    Reference(String),
    /// Computed field
    Virtual {
        /// Getter
        get: VirtualGetFn,
        /// Optional setter; without one the field is read-only
        set: Option<VirtualSetFn>,
    },
    /// Constant exposed on the schema
    Static(Value),
    /// Named instance method
    Method(MethodFn),
    /// Another name for the field at the given path
    Alias(FieldPath),
}

impl NodeKind {
    /// Short name of the classification
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Scalar(_) => "scalar",
            NodeKind::Reference(_) => "reference",
            NodeKind::Virtual { .. } => "virtual",
            NodeKind::Static(_) => "static",
            NodeKind::Method(_) => "method",
            NodeKind::Alias(_) => "alias",
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Scalar(t) => write!(f, "Scalar({})", t),
            NodeKind::Reference(m) => write!(f, "Reference({})", m),
            NodeKind::Virtual { set, .. } => write!(f, "Virtual(settable: {})", set.is_some()),
            NodeKind::Static(v) => write!(f, "Static({})", v),
            NodeKind::Method(_) => f.write_str("Method(..)"),
            NodeKind::Alias(p) => write!(f, "Alias({})", p),
        }
    }
}

/// One compiled field
#[derive(Debug, Clone)]
pub struct TypeNode {
    /// Classification
    pub kind: NodeKind,
    /// Options applied to stored values
    pub options: FieldOptions,
}

impl TypeNode {
    /// Node of the given kind with default options
    pub fn new(kind: NodeKind) -> Self {
        TypeNode {
            kind,
            options: FieldOptions::default(),
        }
    }

    /// Whether the node occupies a slot in the document table
    pub fn is_stored(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar(_) | NodeKind::Reference(_))
    }

    /// Referenced model, for reference nodes
    pub fn reference(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Reference(model) => Some(model),
            _ => None,
        }
    }

    /// Run an incoming value through setter, coercion, enum and validator
    ///
    /// Returns the value to store, or `None` if it is rejected. `null`
    /// is never passed here; it clears the field.
    pub fn accept(&self, value: Value) -> Option<Value> {
        let value = match &self.options.setter {
            Some(setter) => setter(value),
            None => value,
        };
        let value = match &self.kind {
            NodeKind::Scalar(t) => t.coerce(value, self.options.strict)?,
            NodeKind::Reference(_) => {
                key_to_string(&value)?;
                value
            }
            _ => return None,
        };
        if let Some(allowed) = &self.options.one_of {
            if !allowed.contains(&value) {
                return None;
            }
        }
        if let Some(validator) = &self.options.validator {
            if !validator(&value) {
                return None;
            }
        }
        Some(value)
    }

    /// Apply the custom getter, if any
    pub fn present(&self, stored: Value) -> Value {
        match &self.options.getter {
            Some(getter) => getter(stored),
            None => stored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scalar(t: PrimitiveType) -> TypeNode {
        TypeNode::new(NodeKind::Scalar(t))
    }

    #[test]
    fn test_accept_coerces() {
        let node = scalar(PrimitiveType::Number);
        assert_eq!(node.accept(json!("7")), Some(json!(7)));
        assert_eq!(node.accept(json!("seven")), None);
    }

    #[test]
    fn test_enum_checked_after_coercion() {
        let mut node = scalar(PrimitiveType::Number);
        node.options.one_of = Some(vec![json!(1), json!(2)]);
        assert_eq!(node.accept(json!("2")), Some(json!(2)));
        assert_eq!(node.accept(json!(3)), None);
    }

    #[test]
    fn test_setter_runs_before_validator() {
        let mut node = scalar(PrimitiveType::String);
        node.options.setter = Some(Arc::new(|v: Value| match v {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        }));
        node.options.validator = Some(Arc::new(|v: &Value| v.as_str().map_or(false, |s| s.contains('@'))));
        assert_eq!(node.accept(json!("Ann@X.io")), Some(json!("ann@x.io")));
        assert_eq!(node.accept(json!("nobody")), None);
    }

    #[test]
    fn test_getter_applies_on_read() {
        let mut node = scalar(PrimitiveType::String);
        node.options.getter = Some(Arc::new(|v: Value| match v {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        }));
        assert_eq!(node.present(json!("abc")), json!("ABC"));
    }

    #[test]
    fn test_reference_accepts_keys_only() {
        let node = TypeNode::new(NodeKind::Reference("User".into()));
        assert_eq!(node.accept(json!("u1")), Some(json!("u1")));
        assert_eq!(node.accept(json!(5)), Some(json!(5)));
        assert_eq!(node.accept(json!({"id": "u1"})), None);
        assert_eq!(node.reference(), Some("User"));
    }

    #[test]
    fn test_non_stored_kinds_reject_assignment() {
        let node = TypeNode::new(NodeKind::Static(json!(1)));
        assert!(!node.is_stored());
        assert_eq!(node.accept(json!(1)), None);
    }

    #[test]
    fn test_default_value_produce() {
        assert_eq!(DefaultValue::Value(json!("x")).produce(), json!("x"));
        let computed = DefaultValue::Computed(Arc::new(|| json!([])));
        assert_eq!(computed.produce(), json!([]));
    }
}
