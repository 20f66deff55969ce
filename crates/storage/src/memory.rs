//! In-process store
//!
//! `MemoryStore` implements the full store boundary in memory. It enforces
//! CAS exactly like a remote store would, honors expiry, and counts reads
//! per key so callers can observe how many round trips an operation made.
//!
//! # Design
//!
//! - DashMap: sharded map, only the target shard is locked on write
//! - CAS: single monotonic counter for the whole store, bumped on every write
//! - Expiry: checked lazily on access, expired entries behave as absent

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use settee_core::Cas;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::trace;

use crate::stored_value::{
    MultiGet, RemoveOptions, StoreError, StoreResult, StoredValue, UpsertOptions,
};
use crate::traits::Store;

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    cas: Cas,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// In-memory CAS-enforcing store
///
/// The counters use Relaxed ordering; they are observational only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<String, Slot>,
    next_cas: AtomicU64,
    /// key -> number of times it was read through `get`/`get_multi`
    fetches: DashMap<String, u64>,
    multi_gets: AtomicU64,
    writes: AtomicU64,
    /// Key prefixes whose operations fail with a transport error
    failing: RwLock<Vec<String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_cas(&self) -> Cas {
        Cas::new(self.next_cas.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn check_failure(&self, key: &str) -> StoreResult<()> {
        let failing = self.failing.read();
        if failing.iter().any(|p| key.starts_with(p.as_str())) {
            return Err(StoreError::Transport(format!("injected failure for {}", key)));
        }
        Ok(())
    }

    fn read(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        *self.fetches.entry(key.to_string()).or_insert(0) += 1;
        self.check_failure(key)?;
        Ok(self.live(key))
    }

    /// Current entry without touching the counters
    fn live(&self, key: &str) -> Option<StoredValue> {
        let now = Instant::now();
        if let Some(entry) = self.data.get(key) {
            if !entry.is_expired(now) {
                return Some(StoredValue {
                    key: key.to_string(),
                    value: entry.value.clone(),
                    cas: entry.cas,
                });
            }
        }
        self.evict_expired(key, now);
        None
    }

    /// Drop `key` if the entry held at the time of removal has expired
    ///
    /// A concurrent write between the read and the eviction stays.
    pub(crate) fn evict_expired(&self, key: &str, now: Instant) -> bool {
        self.data.remove_if(key, |_, entry| entry.is_expired(now)).is_some()
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Value at `key`, without counting a fetch
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.live(key).map(|v| v.value)
    }

    /// Whether `key` currently exists
    pub fn contains(&self, key: &str) -> bool {
        self.live(key).is_some()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|e| !e.is_expired(now)).count()
    }

    /// Check if the store holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All live keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|e| !e.is_expired(now))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// How many times `key` was read
    pub fn fetch_count(&self, key: &str) -> u64 {
        self.fetches.get(key).map_or(0, |c| *c)
    }

    /// Number of `get_multi` calls served
    pub fn multi_get_count(&self) -> u64 {
        self.multi_gets.load(Ordering::Relaxed)
    }

    /// Number of successful upserts
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Reset all counters
    pub fn reset_stats(&self) {
        self.fetches.clear();
        self.multi_gets.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    /// Make every operation on keys starting with `prefix` fail
    pub fn fail_keys_with_prefix(&self, prefix: impl Into<String>) {
        self.failing.write().push(prefix.into());
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        self.read(key)
    }

    async fn get_multi(&self, keys: &[String]) -> StoreResult<MultiGet> {
        self.multi_gets.fetch_add(1, Ordering::Relaxed);
        let mut out = MultiGet::default();
        for key in keys {
            match self.read(key) {
                Ok(Some(found)) => out.found.push(found),
                Ok(None) => out.misses.push(key.clone()),
                Err(e) => out.errors.push((key.clone(), e)),
            }
        }
        Ok(out)
    }

    async fn upsert(&self, key: &str, value: Value, options: UpsertOptions) -> StoreResult<Cas> {
        self.check_failure(key)?;
        let now = Instant::now();
        let expires_at = options.expiry.map(|d| now + d);

        let cas = match self.data.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if let Some(expected) = options.cas {
                    let current = occupied.get();
                    if current.is_expired(now) {
                        return Err(StoreError::NotFound(key.to_string()));
                    }
                    if current.cas != expected {
                        return Err(StoreError::CasMismatch(key.to_string()));
                    }
                }
                let cas = self.bump_cas();
                occupied.insert(Slot {
                    value,
                    cas,
                    expires_at,
                });
                cas
            }
            MapEntry::Vacant(vacant) => {
                if options.cas.is_some() {
                    return Err(StoreError::NotFound(key.to_string()));
                }
                let cas = self.bump_cas();
                vacant.insert(Slot {
                    value,
                    cas,
                    expires_at,
                });
                cas
            }
        };

        self.writes.fetch_add(1, Ordering::Relaxed);
        trace!(target: "settee::store", key, cas = %cas, "upsert");
        Ok(cas)
    }

    async fn remove(&self, key: &str, options: RemoveOptions) -> StoreResult<()> {
        self.check_failure(key)?;
        let now = Instant::now();
        let removed = self.data.remove_if(key, |_, entry| {
            !entry.is_expired(now) && options.cas.map_or(true, |cas| cas == entry.cas)
        });
        if removed.is_some() {
            trace!(target: "settee::store", key, "remove");
            return Ok(());
        }
        match self.live(key) {
            Some(_) => Err(StoreError::CasMismatch(key.to_string())),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}
