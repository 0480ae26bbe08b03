//! In-process query cache for Veclayer.
//!
//! [`QueryCache`] maps `(collection, fingerprint)` to a cached value with an
//! LRU capacity bound and a per-entry TTL. Writes to a collection drop every
//! entry for that collection via [`QueryCache::invalidate_collection`], and
//! move the collection to a new generation so a read that started before the
//! write cannot repopulate the cache with stale results afterwards
//! ([`QueryCache::put_if_current`]).
//!
//! Generations are stamps from one monotonic clock, so a collection never
//! returns to a generation it had before. Only collections written since the
//! last [`clear`](QueryCache::clear) carry their own stamp, and
//! [`forget_collection`](QueryCache::forget_collection) drops the stamp of a
//! deleted collection.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;
use veclayer_core::CacheConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    collection: String,
    fingerprint: String,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

struct CacheState<V> {
    entries: LruCache<CacheKey, Entry<V>>,
    clock: u64,
    /// Generation of every collection without its own stamp.
    baseline: u64,
    stamps: HashMap<String, u64>,
}

impl<V> CacheState<V> {
    fn generation(&self, collection: &str) -> u64 {
        self.stamps.get(collection).copied().unwrap_or(self.baseline)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn drop_collection(&mut self, collection: &str) -> usize {
        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.collection == collection)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.entries.pop(key);
        }
        stale.len()
    }
}

/// Counters reported by [`QueryCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Stable SHA-256 fingerprint of an operation name and its query.
///
/// Two queries produce the same fingerprint exactly when they serialize
/// to the same JSON, so every field that influences the result
/// (embedding, `top_k`, filter, threshold, include flags) is part of the
/// key. `None` if the query cannot be serialized.
pub fn fingerprint<Q: Serialize + ?Sized>(operation: &str, query: &Q) -> Option<String> {
    let bytes = serde_json::to_vec(query).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}

/// Capacity- and TTL-bounded cache scoped by collection.
pub struct QueryCache<V> {
    state: Mutex<CacheState<V>>,
    ttl: Duration,
    max_entries: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send> QueryCache<V> {
    pub fn new(max_entries: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(max_entries),
                clock: 0,
                baseline: 0,
                stamps: HashMap::new(),
            }),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Build a cache from configuration, or `None` when caching is disabled
    /// or the capacity is zero.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let max_entries = NonZeroUsize::new(config.max_entries)?;
        Some(Self::new(max_entries, config.ttl()))
    }

    /// Look up a live entry. Expired entries are evicted on access.
    pub async fn get(&self, collection: &str, fingerprint: &str) -> Option<V> {
        let key = CacheKey {
            collection: collection.to_string(),
            fingerprint: fingerprint.to_string(),
        };
        let mut state = self.state.lock().await;

        let expired = match state.entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.pop(&key);
            tracing::trace!(collection, "query cache entry expired");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Current write generation of `collection`. Capture it before running a
    /// backend read and pass it to [`put_if_current`](Self::put_if_current).
    pub async fn generation(&self, collection: &str) -> u64 {
        self.state.lock().await.generation(collection)
    }

    /// Insert unconditionally.
    pub async fn put(&self, collection: &str, fingerprint: &str, value: V) {
        let mut state = self.state.lock().await;
        Self::insert(&mut state, collection, fingerprint, value);
    }

    /// Insert only if no write to `collection` happened since `generation`
    /// was captured. Returns whether the value was stored.
    pub async fn put_if_current(
        &self,
        collection: &str,
        fingerprint: &str,
        generation: u64,
        value: V,
    ) -> bool {
        let mut state = self.state.lock().await;
        if state.generation(collection) != generation {
            tracing::trace!(collection, "skipping cache fill after concurrent write");
            return false;
        }
        Self::insert(&mut state, collection, fingerprint, value);
        true
    }

    fn insert(state: &mut CacheState<V>, collection: &str, fingerprint: &str, value: V) {
        state.entries.put(
            CacheKey {
                collection: collection.to_string(),
                fingerprint: fingerprint.to_string(),
            },
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry of `collection` and advance its generation.
    /// Returns the number of entries removed.
    pub async fn invalidate_collection(&self, collection: &str) -> usize {
        let mut state = self.state.lock().await;
        let stamp = state.tick();
        state.stamps.insert(collection.to_string(), stamp);

        let removed = state.drop_collection(collection);
        if removed > 0 {
            tracing::debug!(collection, removed, "query cache invalidated");
        }
        removed
    }

    /// Invalidate a collection that no longer exists and stop tracking it.
    ///
    /// Every collection without a stamp moves to a fresh baseline, which can
    /// discard a few unrelated in-flight fills but never accepts a stale one.
    pub async fn forget_collection(&self, collection: &str) -> usize {
        let mut state = self.state.lock().await;
        state.baseline = state.tick();
        state.stamps.remove(collection);

        let removed = state.drop_collection(collection);
        tracing::debug!(collection, removed, "query cache forgot collection");
        removed
    }

    /// Drop every entry. Generations advance so in-flight fills are discarded.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.baseline = state.tick();
        state.stamps.clear();
    }

    /// Number of collections carrying their own generation stamp.
    pub async fn tracked_collections(&self) -> usize {
        self.state.lock().await.stamps.len()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len().await,
            max_entries: self.max_entries.get(),
        }
    }
}
