//! Plain value helpers

use serde_json::{Map, Value};

/// Drop empty-object branches, recursively
///
/// A nested object that ends up with no keys after its own children are
/// minimized is removed from its parent. Arrays and nulls are kept: only
/// the absence of data is dropped, never an explicit value.
pub fn minimize(value: &mut Value) {
    match value {
        Value::Object(obj) => minimize_object(obj),
        Value::Array(items) => items.iter_mut().for_each(minimize),
        _ => {}
    }
}

fn minimize_object(obj: &mut Map<String, Value>) {
    obj.values_mut().for_each(minimize);
    obj.retain(|_, v| !matches!(v, Value::Object(inner) if inner.is_empty()));
}

/// Render a scalar as an index value
///
/// Index documents are keyed by text, so numbers and booleans are
/// stringified. Containers and null have no index form.
pub fn index_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
