//! TTL cache for injected context bundles
//!
//! Expiry is lazy: an entry older than the TTL is removed when it is read,
//! there is no background sweep. Concurrent misses on the same key both
//! recompute and the last store wins.

use super::models::ContextBundle;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const NONE_ID: &str = "none";

/// Cache key: agent type, spec id and task id (`"none"` when absent)
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CacheKey {
    agent_type: String,
    spec_id: String,
    task_id: String,
}

impl CacheKey {
    pub fn new(agent_type: &str, spec_id: Option<&str>, task_id: Option<&str>) -> Self {
        Self {
            agent_type: agent_type.to_string(),
            spec_id: spec_id.unwrap_or(NONE_ID).to_string(),
            task_id: task_id.unwrap_or(NONE_ID).to_string(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.agent_type, self.spec_id, self.task_id)
    }
}

/// Cache entry with its storage time
#[derive(Debug, Clone)]
struct CacheEntry {
    bundle: ContextBundle,
    stored_at_ms: i64,
}

/// Bundle cache keyed by request
#[derive(Debug, Clone)]
pub struct BundleCache {
    entries: Arc<Mutex<HashMap<CacheKey, CacheEntry>>>,
    ttl_ms: i64,
    max_size: usize,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl BundleCache {
    /// Create a new cache with TTL (milliseconds) and max size
    pub fn new(ttl_ms: u64, max_size: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl_ms: i64::try_from(ttl_ms).unwrap_or(i64::MAX),
            max_size: max_size.max(1),
        }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // A poisoned cache only ever holds complete entries
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &CacheEntry, now: i64) -> bool {
        now.saturating_sub(entry.stored_at_ms) > self.ttl_ms
    }

    /// Get a live bundle
    pub fn get(&self, key: &CacheKey) -> Option<ContextBundle> {
        self.get_at(key, now_ms())
    }

    /// Get a bundle as of `now` (epoch ms), removing it if it has expired
    pub fn get_at(&self, key: &CacheKey, now: i64) -> Option<ContextBundle> {
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            Some(entry) if !self.is_expired(entry, now) => return Some(entry.bundle.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!("Evicting expired cache entry {}", key);
            entries.remove(key);
        }
        None
    }

    /// Store a bundle
    pub fn store(&self, key: CacheKey, bundle: ContextBundle) {
        self.store_at(key, bundle, now_ms());
    }

    /// Store a bundle stamped with `now` (epoch ms)
    pub fn store_at(&self, key: CacheKey, bundle: ContextBundle, now: i64) {
        let mut entries = self.lock();

        // Evict oldest if at capacity
        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            Self::evict_oldest(&mut entries);
        }

        entries.insert(
            key,
            CacheEntry {
                bundle,
                stored_at_ms: now,
            },
        );
    }

    fn evict_oldest(entries: &mut HashMap<CacheKey, CacheEntry>) {
        if let Some(oldest_key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at_ms)
            .map(|(key, _)| key.clone())
        {
            entries.remove(&oldest_key);
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = now_ms();
        let entries = self.lock();
        let valid_count = entries
            .values()
            .filter(|entry| !self.is_expired(entry, now))
            .count();

        CacheStats {
            total_entries: entries.len(),
            valid_entries: valid_count,
            expired_entries: entries.len() - valid_count,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::{
        BundleMetadata, ContextLayers, FilteringReport, InheritedContext, ValidationResult,
    };
    use indexmap::IndexMap;

    fn bundle(agent_type: &str) -> ContextBundle {
        ContextBundle {
            metadata: BundleMetadata {
                request_id: uuid::Uuid::new_v4(),
                agent_type: agent_type.to_string(),
                spec_id: None,
                task_id: None,
                injection_time: Utc::now(),
                performance: IndexMap::new(),
            },
            layers: ContextLayers::default(),
            inheritance: InheritedContext::default(),
            filtering: FilteringReport::default(),
            validation: ValidationResult::new(),
            automation: None,
        }
    }

    #[test]
    fn test_key_uses_none_placeholder() {
        let key = CacheKey::new("backend-developer", None, Some("T-1"));
        assert_eq!(key.to_string(), "backend-developer:none:T-1");
        assert_eq!(key, CacheKey::new("backend-developer", None, Some("T-1")));
    }

    #[test]
    fn test_cache_store_and_get() {
        let cache = BundleCache::new(60_000, 10);
        let key = CacheKey::new("backend-developer", None, None);
        cache.store_at(key.clone(), bundle("backend-developer"), 1_000);

        let hit = cache.get_at(&key, 2_000).unwrap();
        assert_eq!(hit.metadata.agent_type, "backend-developer");
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let ttl = 300_000;
        let cache = BundleCache::new(ttl, 10);
        let key = CacheKey::new("backend-developer", Some("FEAT-1"), None);
        let stored_at = 10_000;
        cache.store_at(key.clone(), bundle("backend-developer"), stored_at);

        // Exactly at the TTL the entry is still live
        assert!(cache.get_at(&key, stored_at + ttl as i64).is_some());

        assert!(cache.get_at(&key, stored_at + ttl as i64 + 1).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cache_eviction() {
        let cache = BundleCache::new(60_000, 2);
        cache.store_at(CacheKey::new("a", None, None), bundle("a"), 1);
        cache.store_at(CacheKey::new("b", None, None), bundle("b"), 2);
        cache.store_at(CacheKey::new("c", None, None), bundle("c"), 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get_at(&CacheKey::new("a", None, None), 4).is_none());
        assert!(cache.get_at(&CacheKey::new("c", None, None), 4).is_some());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = BundleCache::new(60_000, 4);
        let key = CacheKey::new("a", None, None);
        let first = bundle("a");
        let second = bundle("a");
        let second_id = second.metadata.request_id;

        cache.store_at(key.clone(), first, 1);
        cache.store_at(key.clone(), second, 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&key, 3).unwrap().metadata.request_id, second_id);
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = BundleCache::new(60_000, 4);
        cache.store(CacheKey::new("a", None, None), bundle("a"));
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.valid_entries, 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
