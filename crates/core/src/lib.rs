//! Core types for settee
//!
//! This crate defines the foundational pieces shared by every layer:
//! - Error: error taxonomy and `Result` alias
//! - Cas: opaque compare-and-swap token
//! - Lifecycle: named lifecycle operations (save, remove, index)
//! - FieldPath: dotted paths into documents, plus get/set/delete helpers
//! - KeyPolicy: document key expansion and shortening, index key format
//! - value helpers: minimization and index text rendering

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;
pub mod path;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use key::{
    index_key, key_to_string, KeyPolicy, DEFAULT_DELIMITER, DEFAULT_REF_INDEX_KEY_PREFIX,
};
pub use path::{
    delete_at_path, get_at_path, set_at_path, value_type_name, FieldPath, PathParseError,
    PathSegment,
};
pub use types::{Cas, Lifecycle};
pub use value::{index_text, minimize};
