//! Request-scoped fetch memo

use settee_storage::StoredValue;
use std::collections::HashMap;

/// Results of store reads made during one call
///
/// `None` records a key known to be absent (or unreadable) so it is not
/// asked for again. The memo lives exactly as long as the call that
/// created it.
#[derive(Debug, Default)]
pub struct FetchMemo {
    entries: HashMap<String, Option<StoredValue>>,
    hits: usize,
}

impl FetchMemo {
    /// Empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded outcome for `key`, counting a hit when present
    pub fn lookup(&mut self, key: &str) -> Option<&Option<StoredValue>> {
        let entry = self.entries.get(key);
        if entry.is_some() {
            self.hits += 1;
        }
        entry
    }

    /// Whether `key` has been fetched
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record a found value
    pub fn found(&mut self, value: StoredValue) {
        self.entries.insert(value.key.clone(), Some(value));
    }

    /// Record an absent key
    pub fn absent(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), None);
    }

    /// Number of keys recorded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the memo
    pub fn hits(&self) -> usize {
        self.hits
    }
}
