//! Primitive field types and their coercion rules
//!
//! | Type | Accepts (lenient) | Accepts (strict) |
//! |------|-------------------|------------------|
//! | `String` | string, number, boolean | string |
//! | `Number` | number, numeric string | number |
//! | `Boolean` | boolean, `"true"`/`"false"` | boolean |
//! | `Date` | RFC 3339 string, epoch milliseconds | RFC 3339 string |
//! | `Mixed` | anything | anything |
//!
//! Coercion returns `None` for a rejected value; the caller leaves the
//! field unchanged.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Type of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// UTF-8 text
    String,
    /// JSON number
    Number,
    /// true/false
    Boolean,
    /// Point in time, stored as RFC 3339 text
    Date,
    /// Any JSON value, unchecked
    Mixed,
}

impl PrimitiveType {
    /// Parse a descriptor marker such as `"String"`
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "String" => Some(PrimitiveType::String),
            "Number" => Some(PrimitiveType::Number),
            "Boolean" => Some(PrimitiveType::Boolean),
            "Date" => Some(PrimitiveType::Date),
            "Mixed" => Some(PrimitiveType::Mixed),
            _ => None,
        }
    }

    /// Descriptor marker for this type
    pub const fn marker(&self) -> &'static str {
        match self {
            PrimitiveType::String => "String",
            PrimitiveType::Number => "Number",
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Date => "Date",
            PrimitiveType::Mixed => "Mixed",
        }
    }

    /// Whether values of this type can back a secondary index
    pub const fn is_indexable(&self) -> bool {
        matches!(self, PrimitiveType::String | PrimitiveType::Number)
    }

    /// Whether values of this type can serve as a document key
    pub const fn is_key_type(&self) -> bool {
        matches!(self, PrimitiveType::String | PrimitiveType::Number)
    }

    /// Coerce `value` to this type
    ///
    /// `null` is not handled here; clearing a field is decided by the
    /// caller before coercion.
    pub fn coerce(&self, value: Value, strict: bool) -> Option<Value> {
        match self {
            PrimitiveType::Mixed => Some(value),
            PrimitiveType::String => coerce_string(value, strict),
            PrimitiveType::Number => coerce_number(value, strict),
            PrimitiveType::Boolean => coerce_boolean(value, strict),
            PrimitiveType::Date => coerce_date(value, strict),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

fn coerce_string(value: Value, strict: bool) -> Option<Value> {
    match value {
        Value::String(_) => Some(value),
        _ if strict => None,
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn coerce_number(value: Value, strict: bool) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value),
        _ if strict => None,
        Value::String(s) => parse_number(s.trim()).map(Value::Number),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if text.is_empty() {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn coerce_boolean(value: Value, strict: bool) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value),
        _ if strict => None,
        Value::String(s) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_date(value: Value, strict: bool) -> Option<Value> {
    let parsed: DateTime<Utc> = match &value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc),
        _ if strict => return None,
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single()?,
        _ => return None,
    };
    Some(Value::String(
        parsed.to_rfc3339_opts(SecondsFormat::Millis, true),
    ))
}
