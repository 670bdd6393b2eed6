//! Bounded cache primitives shared by the identifier, expression,
//! translation, and SQL template caches
use std::collections::{HashMap, VecDeque};
use xxhash_rust::xxh3::xxh3_64;

/// Separator inserted between key parts so that ("ab", "c") and
/// ("a", "bc") hash differently
const KEY_SEPARATOR: u8 = 0x1f;

/// Compute a 16-character hex cache key from the given parts using xxh3
pub fn cache_key(parts: &[&str]) -> String {
    let mut buf = Vec::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for part in parts {
        buf.extend_from_slice(part.as_bytes());
        buf.push(KEY_SEPARATOR);
    }
    format!("{:016x}", xxh3_64(&buf))
}

/// Hit/miss/eviction counters for a bounded cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate in [0, 1]; zero when the cache has never been read
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Insertion-ordered bounded cache with deterministic oldest-first eviction.
///
/// On overflow a fixed percentage of the oldest entries is dropped in one
/// batch, keeping eviction reproducible across runs.
#[derive(Debug)]
pub struct BoundedCache<V> {
    entries: HashMap<String, V>,
    order: VecDeque<String>,
    capacity: usize,
    evict_percent: usize,
    stats: CacheStats,
}

impl<V> BoundedCache<V> {
    /// Create a cache holding at most `capacity` entries; on overflow the
    /// oldest `evict_percent` percent are dropped (at least one entry)
    pub fn new(capacity: usize, evict_percent: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        assert!(
            evict_percent > 0 && evict_percent <= 100,
            "evict percent must be in 1..=100"
        );
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            evict_percent,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<&V> {
        if self.entries.contains_key(key) {
            self.stats.hits += 1;
            self.entries.get(key)
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Look up without touching the hit/miss counters
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, value: V) {
        if self.entries.contains_key(&key) {
            // Idempotent overwrite keeps the original insertion order
            self.entries.insert(key, value);
            return;
        }
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        self.stats.insertions += 1;
    }

    fn evict_oldest(&mut self) {
        let batch = (self.capacity * self.evict_percent / 100).max(1);
        for _ in 0..batch {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    self.stats.evictions += 1;
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_16_hex_chars() {
        let key = cache_key(&["users", "simple_select"]);
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_cache_key_part_boundaries_matter() {
        assert_ne!(cache_key(&["ab", "c"]), cache_key(&["a", "bc"]));
        assert_ne!(cache_key(&["abc"]), cache_key(&["ab", "c"]));
    }

    #[test]
    fn test_cache_key_deterministic() {
        assert_eq!(
            cache_key(&["mysql", "simple_select", "users"]),
            cache_key(&["mysql", "simple_select", "users"])
        );
    }

    #[test]
    fn test_get_records_hits_and_misses() {
        let mut cache: BoundedCache<i32> = BoundedCache::new(10, 25);
        assert!(cache.get("a").is_none());
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(&1));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
    }

    #[test]
    fn test_eviction_drops_oldest_batch() {
        let mut cache: BoundedCache<usize> = BoundedCache::new(8, 25);
        for i in 0..8 {
            cache.insert(format!("k{i}"), i);
        }
        assert_eq!(cache.len(), 8);
        // Ninth insert evicts the oldest 25% (2 entries)
        cache.insert("k8".to_string(), 8);
        assert_eq!(cache.len(), 7);
        assert!(cache.peek("k0").is_none());
        assert!(cache.peek("k1").is_none());
        assert!(cache.peek("k2").is_some());
        assert!(cache.peek("k8").is_some());
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_overwrite_does_not_grow_or_evict() {
        let mut cache: BoundedCache<i32> = BoundedCache::new(2, 50);
        cache.insert("a".to_string(), 1);
        cache.insert("a".to_string(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek("a"), Some(&2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_hit_rate() {
        let mut cache: BoundedCache<i32> = BoundedCache::new(4, 25);
        cache.insert("a".to_string(), 1);
        cache.get("a");
        cache.get("b");
        assert!((cache.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
