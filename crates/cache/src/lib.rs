//! Time-boxed memoization of attribution results.
//!
//! One mutex serializes every mutation: weights depend on the active
//! configuration, so a whole-cache invalidation must never interleave with
//! a stale write from a concurrent recomputation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use attribution_core::types::AttributionResult;

/// Cache key: which sequence, under which configuration revision, for
/// which query range. Including the config version means a re-activated
/// config id with new contents can never serve stale entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub journey_id: String,
    pub config_id: Uuid,
    pub config_version: u32,
    /// Exact epoch-second endpoints of the originating query range, so
    /// distinct ranges never share an entry.
    pub range_secs: (i64, i64),
}

impl CacheKey {
    /// Key for push-delivered results, which carry no originating query
    /// range. The `(0, 0)` sentinel marks "latest known" for the journey.
    pub fn latest(result: &AttributionResult) -> Self {
        Self {
            journey_id: result.journey_id.clone(),
            config_id: result.config_id,
            config_version: result.config_version,
            range_secs: (0, 0),
        }
    }
}

struct CacheEntry {
    result: AttributionResult,
    inserted_at: Instant,
    last_access: Instant,
}

/// TTL + LRU bounded cache for computed attribution results.
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl ResultCache {
    pub fn new(ttl_secs: u64, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity.min(1024))),
            ttl: Duration::from_secs(ttl_secs),
            capacity,
        }
    }

    /// Returns the cached result if present and not expired. Expired
    /// entries are removed on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<AttributionResult> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            if entry.inserted_at.elapsed() <= self.ttl {
                entry.last_access = Instant::now();
                metrics::counter!("attribution.cache.hit").increment(1);
                return Some(entry.result.clone());
            }
        }
        // Missing, or expired and dropped on the way out.
        entries.remove(key);
        metrics::counter!("attribution.cache.miss").increment(1);
        None
    }

    /// Insert or refresh an entry, evicting the least-recently-used one
    /// first when at capacity.
    pub fn put(&self, key: CacheKey, result: AttributionResult) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(lru_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&lru_key);
                metrics::counter!("attribution.cache.eviction").increment(1);
            }
        }
        let now = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: now,
                last_access: now,
            },
        );
    }

    /// Drop every entry. Called whenever the active configuration changes,
    /// since every cached weight depends on it.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        metrics::counter!("attribution.cache.invalidation").increment(1);
        debug!(dropped, "result cache invalidated");
    }

    /// Remove expired entries. Call periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.inserted_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
