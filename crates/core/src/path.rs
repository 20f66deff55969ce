//! Dotted field paths
//!
//! Schema fields, reference declarations and index declarations are all
//! addressed by dotted paths such as `profile.avatar` or `posts[2]`.
//! This module defines:
//! - FieldPath: parsed path (sequence of segments)
//! - PathSegment: a single component (Key or Index)
//! - get/set/delete helpers over `serde_json::Value`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// FieldPath and PathSegment
// =============================================================================

/// Error type for field path parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Empty key in path
    #[error("empty key in path at position {0}")]
    EmptyKey(usize),
    /// Unclosed bracket
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    /// Invalid array index
    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),
    /// Unexpected character
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// A segment in a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object key: `.foo`
    Key(String),
    /// Array index: `[0]`
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A path to a field inside a document
///
/// | Syntax | Meaning | Example |
/// |--------|---------|---------|
/// | `key` | Field | `email` |
/// | `a.b` | Nested field | `profile.avatar` |
/// | `a[n]` | Array slot | `posts[1]` |
/// | (empty) | Document root | `` |
///
/// ```
/// use settee_core::FieldPath;
///
/// let path: FieldPath = "posts.author".parse().unwrap();
/// let posts = FieldPath::root().key("posts");
/// assert!(posts.is_ancestor_of(&path));
/// assert_eq!(path.strip_prefix(&posts).unwrap().to_string(), "author");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Create the root path (empty path)
    pub fn root() -> Self {
        FieldPath {
            segments: Vec::new(),
        }
    }

    /// Create a path from a vector of segments
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        FieldPath { segments }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if this is the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a key segment (builder pattern)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment (builder pattern)
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// Push a key segment (mutating)
    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(PathSegment::Key(key.into()));
    }

    /// Get the parent path (None if root)
    pub fn parent(&self) -> Option<FieldPath> {
        if self.segments.is_empty() {
            None
        } else {
            let mut parent = self.clone();
            parent.segments.pop();
            Some(parent)
        }
    }

    /// Last key segment, the field's own name
    pub fn last_key(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            PathSegment::Key(k) => Some(k.as_str()),
            PathSegment::Index(_) => None,
        })
    }

    /// Check if this path is an ancestor of another (or equal)
    pub fn is_ancestor_of(&self, other: &FieldPath) -> bool {
        if self.segments.len() > other.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }

    /// Remainder of this path after `prefix`, if `prefix` is an ancestor
    pub fn strip_prefix(&self, prefix: &FieldPath) -> Option<FieldPath> {
        if prefix.is_ancestor_of(self) {
            Some(FieldPath::from_segments(
                self.segments[prefix.segments.len()..].to_vec(),
            ))
        } else {
            None
        }
    }

    /// Same path with every index segment dropped
    ///
    /// Turns an instance address (`posts[1].author`) into the schema path
    /// that declares it (`posts.author`).
    pub fn without_indices(&self) -> FieldPath {
        FieldPath::from_segments(
            self.segments
                .iter()
                .filter(|s| matches!(s, PathSegment::Key(_)))
                .cloned()
                .collect(),
        )
    }

    /// Convert to a string representation
    pub fn to_path_string(&self) -> String {
        let mut result = String::new();
        for seg in &self.segments {
            match seg {
                PathSegment::Key(k) => {
                    if !result.is_empty() {
                        result.push('.');
                    }
                    result.push_str(k);
                }
                PathSegment::Index(i) => {
                    result.push('[');
                    result.push_str(&i.to_string());
                    result.push(']');
                }
            }
        }
        result
    }
}

impl FromStr for FieldPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(FieldPath::root());
        }

        let mut segments = Vec::new();
        let chars: Vec<char> = s.chars().collect();
        let mut i = 0;

        if chars[0] == '.' {
            i += 1;
        }

        while i < chars.len() {
            if chars[i] == '.' {
                i += 1;
                if i >= chars.len() {
                    return Err(PathParseError::EmptyKey(i));
                }
            }

            if chars[i] == '[' {
                let start = i;
                i += 1;
                let idx_start = i;
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(PathParseError::UnclosedBracket(start));
                }
                let idx_str: String = chars[idx_start..i].iter().collect();
                let idx = idx_str
                    .parse::<usize>()
                    .map_err(|_| PathParseError::InvalidIndex(idx_start, idx_str))?;
                segments.push(PathSegment::Index(idx));
                i += 1;
            } else if is_key_char(chars[i]) {
                let key_start = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                segments.push(PathSegment::Key(chars[key_start..i].iter().collect()));
            } else if chars[i] == '.' {
                return Err(PathParseError::EmptyKey(i));
            } else {
                return Err(PathParseError::UnexpectedChar(chars[i], i));
            }
        }

        Ok(FieldPath { segments })
    }
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '$'
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

impl From<&str> for FieldPath {
    /// Lenient conversion: splits on dots, no index parsing
    fn from(s: &str) -> Self {
        FieldPath::from_segments(
            s.split('.')
                .filter(|p| !p.is_empty())
                .map(|p| PathSegment::Key(p.to_string()))
                .collect(),
        )
    }
}

// =============================================================================
// Path Operations
// =============================================================================

/// Get value at path within a plain value tree
pub fn get_at_path<'a>(value: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(obj)) => obj.get(key)?,
            (PathSegment::Index(idx), Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set value at path, creating intermediate objects as needed
///
/// Returns false when a segment runs into a non-container value or an
/// out-of-range index. Intermediate objects created before the failing
/// segment are kept.
pub fn set_at_path(root: &mut Value, path: &FieldPath, value: Value) -> bool {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return true;
    };

    let mut current = root;
    for segment in parents {
        current = match segment {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(obj) => obj
                        .entry(key.clone())
                        .or_insert_with(|| Value::Object(Map::new())),
                    _ => return false,
                }
            }
            PathSegment::Index(idx) => match current {
                Value::Array(arr) if *idx < arr.len() => &mut arr[*idx],
                _ => return false,
            },
        };
    }

    match (last, current) {
        (PathSegment::Key(key), Value::Object(obj)) => {
            obj.insert(key.clone(), value);
            true
        }
        (PathSegment::Key(key), slot @ Value::Null) => {
            let mut obj = Map::new();
            obj.insert(key.clone(), value);
            *slot = Value::Object(obj);
            true
        }
        (PathSegment::Index(idx), Value::Array(arr)) if *idx < arr.len() => {
            arr[*idx] = value;
            true
        }
        (PathSegment::Index(idx), Value::Array(arr)) if *idx == arr.len() => {
            arr.push(value);
            true
        }
        _ => false,
    }
}

/// Remove the value at path, returning it if it existed
pub fn delete_at_path(root: &mut Value, path: &FieldPath) -> Option<Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = root;
    for segment in parents {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(obj)) => obj.get_mut(key)?,
            (PathSegment::Index(idx), Value::Array(arr)) => arr.get_mut(*idx)?,
            _ => return None,
        };
    }
    match (last, current) {
        (PathSegment::Key(key), Value::Object(obj)) => obj.remove(key),
        (PathSegment::Index(idx), Value::Array(arr)) if *idx < arr.len() => Some(arr.remove(*idx)),
        _ => None,
    }
}

/// Helper to get type name for diagnostics
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
