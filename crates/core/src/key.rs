//! Document and index key formats
//!
//! ## Document keys
//!
//! A document stores a short key in its key field. The key used in the
//! store is derived from it:
//!
//! `prefix? + delimiter? + short + delimiter? + suffix?`
//!
//! Prefix and suffix (and their delimiters) appear only when configured.
//! `shorten` strips exactly what `expand` adds, so
//! `shorten(expand(k)) == k` for every `k`.
//!
//! ## Index keys
//!
//! Lookup documents live at `ref_index_key_prefix + index_name + delimiter + value`,
//! e.g. `$_ref_by_email_ann@example.com`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default separator between key parts
pub const DEFAULT_DELIMITER: &str = "_";

/// Default prefix of index (lookup) document keys
pub const DEFAULT_REF_INDEX_KEY_PREFIX: &str = "$_ref_by_";

/// How a schema derives store keys from its key field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPolicy {
    /// Name of the top-level field holding the short key
    pub field: String,
    /// Optional prefix
    pub prefix: Option<String>,
    /// Optional suffix
    pub suffix: Option<String>,
    /// Generate a unique key at construction when none is given
    pub generate: bool,
    /// Separator between prefix, key and suffix
    pub delimiter: String,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        KeyPolicy {
            field: "id".to_string(),
            prefix: None,
            suffix: None,
            generate: true,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

impl KeyPolicy {
    /// Policy for the given key field, with defaults elsewhere
    pub fn for_field(field: impl Into<String>) -> Self {
        KeyPolicy {
            field: field.into(),
            ..KeyPolicy::default()
        }
    }

    fn head(&self) -> Option<String> {
        self.prefix
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}{}", p, self.delimiter))
    }

    fn tail(&self) -> Option<String> {
        self.suffix
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("{}{}", self.delimiter, s))
    }

    /// Full store key for a short key
    pub fn expand(&self, short: &str) -> String {
        let mut out = String::with_capacity(short.len() + 16);
        if let Some(head) = self.head() {
            out.push_str(&head);
        }
        out.push_str(short);
        if let Some(tail) = self.tail() {
            out.push_str(&tail);
        }
        out
    }

    /// Short key for a full store key
    ///
    /// Strips one configured prefix and one configured suffix when present.
    /// Keys without them are returned unchanged.
    pub fn shorten<'a>(&self, full: &'a str) -> &'a str {
        let mut short = full;
        if let Some(head) = self.head() {
            short = short.strip_prefix(head.as_str()).unwrap_or(short);
        }
        if let Some(tail) = self.tail() {
            short = short.strip_suffix(tail.as_str()).unwrap_or(short);
        }
        short
    }

    /// Full store key for a key that may already be expanded
    ///
    /// Reference fields and key fields may hold either form depending on
    /// `store_full_reference_id` / `store_full_key`. Normalizing through
    /// the short form never applies a prefix twice.
    pub fn to_full(&self, key: &str) -> String {
        self.expand(self.shorten(key))
    }
}

/// Key of the lookup document for one indexed value
pub fn index_key(ref_index_key_prefix: &str, index_name: &str, delimiter: &str, value: &str) -> String {
    format!("{}{}{}{}", ref_index_key_prefix, index_name, delimiter, value)
}

/// Render a key-field value as a key string
///
/// Only strings and numbers are key-coercible.
pub fn key_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
