//! Per-validator result cache.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheConfig;
use crate::findings::ValidationResult;

struct CacheEntry {
    result: Arc<ValidationResult>,
    inserted_at: Instant,
    /// Insertion order, used for eviction.
    sequence: u64,
    hits: AtomicU64,
}

/// A cached result and how often its entry has been hit, this hit included.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub result: Arc<ValidationResult>,
    pub hits: u64,
}

/// Counters describing cache usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of live entries.
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Validation results keyed by fandom and pathway signature.
///
/// Entries expire after the TTL. When full, the oldest-inserted entry is evicted.
/// Safe to share between threads.
pub struct ValidationCache {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    next_sequence: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ValidationCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
            next_sequence: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    /// Look up a live entry. Expired entries are removed on the way.
    pub fn get(&self, key: &str) -> Option<CacheHit> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                let hits = entry.hits.fetch_add(1, Ordering::Relaxed) + 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, hits, "Validation cache hit");
                return Some(CacheHit {
                    result: Arc::clone(&entry.result),
                    hits,
                });
            }
            Some(_) => true,
            None => false,
        };

        // The read guard is released above; removing while holding it would deadlock.
        if expired {
            self.entries.remove(key);
            debug!(key, "Validation cache entry expired");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a result, evicting the oldest entries if the cache is full.
    pub fn insert(&self, key: String, result: ValidationResult) -> Arc<ValidationResult> {
        let result = Arc::new(result);

        if !self.entries.contains_key(&key) {
            if self.entries.len() >= self.capacity {
                self.sweep_expired();
            }
            while self.entries.len() >= self.capacity {
                if !self.evict_oldest() {
                    break;
                }
            }
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            CacheEntry {
                result: Arc::clone(&result),
                inserted_at: Instant::now(),
                sequence,
                hits: AtomicU64::new(0),
            },
        );
        result
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().sequence)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Evicted oldest validation cache entry");
                true
            }
            None => false,
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Swept expired validation cache entries");
        }
        removed
    }

    /// Drop every entry for a fandom, e.g. after its catalog changed.
    pub fn invalidate_fandom(&self, fandom_id: &str) -> usize {
        let prefix = format!("{}|", fandom_id);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        let removed = before.saturating_sub(self.entries.len());
        debug!(fandom_id, removed, "Invalidated validation cache for fandom");
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ValidationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationCache")
            .field("entries", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::RuleOutcome;
    use std::thread;

    fn result(score: u8) -> ValidationResult {
        ValidationResult::from_outcome(RuleOutcome::new(), score)
    }

    #[test]
    fn test_hit_counts() {
        let cache = ValidationCache::new(10, Duration::from_secs(60));
        cache.insert("hp|tag:a".to_string(), result(90));

        assert_eq!(cache.get("hp|tag:a").map(|h| h.hits), Some(1));
        let hit = cache.get("hp|tag:a").unwrap();
        assert_eq!(hit.hits, 2);
        assert_eq!(hit.result.score, 90);
        assert!(cache.get("hp|tag:b").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = ValidationCache::new(10, Duration::ZERO);
        cache.insert("hp|tag:a".to_string(), result(90));

        assert!(cache.get("hp|tag:a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_expired() {
        let cache = ValidationCache::new(10, Duration::ZERO);
        cache.insert("a".to_string(), result(1));
        cache.insert("b".to_string(), result(2));

        assert_eq!(cache.sweep_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let cache = ValidationCache::new(2, Duration::from_secs(60));
        cache.insert("first".to_string(), result(1));
        cache.insert("second".to_string(), result(2));

        // Hits do not protect an entry from eviction.
        assert!(cache.get("first").is_some());
        cache.insert("third".to_string(), result(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let cache = ValidationCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), result(1));
        cache.insert("b".to_string(), result(2));
        cache.insert("a".to_string(), result(3));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().result.score, 3);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_invalidate_fandom() {
        let cache = ValidationCache::new(10, Duration::from_secs(60));
        cache.insert("hp|tag:a".to_string(), result(1));
        cache.insert("hp|plot_block:b".to_string(), result(2));
        cache.insert("hpx|tag:a".to_string(), result(3));

        assert_eq!(cache.invalidate_fandom("hp"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("hpx|tag:a").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(ValidationCache::new(64, Duration::from_secs(60)));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("f{}|{}", t, i % 4);
                        if cache.get(&key).is_none() {
                            cache.insert(key, result(i as u8));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 32);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 400);
    }
}
