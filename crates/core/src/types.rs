//! Small shared value types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque compare-and-swap token
///
/// Returned by the store on every read and write. Supplying it back on a
/// write or remove makes the store reject the call if the document changed
/// in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cas(u64);

impl Cas {
    /// Wrap a raw token
    pub const fn new(raw: u64) -> Self {
        Cas(raw)
    }

    /// Raw token value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Named lifecycle operation
///
/// Used both for hook registration and for emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Document write
    Save,
    /// Document removal
    Remove,
    /// Index document maintenance
    Index,
}

impl Lifecycle {
    /// Lowercase event name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Save => "save",
            Lifecycle::Remove => "remove",
            Lifecycle::Index => "index",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
