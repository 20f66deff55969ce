//! Reference population
//!
//! Replaces reference keys with the documents they name. Each top-level
//! call gets its own `Resolver`, which owns a fetch memo for the duration
//! of the call: a key reached through several paths or array elements is
//! read from the store once. Keys that are not in the store are reported,
//! never raised.

mod memo;
mod resolver;

pub use memo::FetchMemo;
pub(crate) use resolver::Resolver;

use settee_core::FieldPath;

/// What to populate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Populate {
    /// Every declared reference, recursively up to the configured depth
    All,
    /// One dotted path; segments past the first reference recurse into
    /// the fetched documents (`posts.author`)
    Path(FieldPath),
    /// Each spec applied to the same documents
    Many(Vec<Populate>),
}

impl Populate {
    /// Spec that populates nothing
    pub fn none() -> Self {
        Populate::Many(Vec::new())
    }

    /// Whether the spec populates nothing
    pub fn is_none(&self) -> bool {
        match self {
            Populate::Many(specs) => specs.iter().all(Populate::is_none),
            _ => false,
        }
    }
}

impl From<bool> for Populate {
    fn from(all: bool) -> Self {
        if all {
            Populate::All
        } else {
            Populate::none()
        }
    }
}

impl From<&str> for Populate {
    fn from(path: &str) -> Self {
        Populate::Path(FieldPath::from(path))
    }
}

impl From<FieldPath> for Populate {
    fn from(path: FieldPath) -> Self {
        Populate::Path(path)
    }
}

impl From<Vec<&str>> for Populate {
    fn from(paths: Vec<&str>) -> Self {
        Populate::Many(paths.into_iter().map(Populate::from).collect())
    }
}

impl From<Vec<Populate>> for Populate {
    fn from(specs: Vec<Populate>) -> Self {
        Populate::Many(specs)
    }
}
