//! In-memory geocode cache.
//!
//! Keys are lower-cased sanitized addresses. Entries expire after the TTL
//! (24 h by default). When the cache is full, the oldest 10% of entries by
//! insertion timestamp are evicted before inserting. Hits are counted for
//! statistics only and do not affect eviction order.

use super::types::{GeocodeResult, ResultSource};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct CachedEntry {
    result: GeocodeResult,
    timestamp: DateTime<Utc>,
    hits: u64,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(GeocodeResult),
    /// The entry existed but had outlived the TTL and was removed.
    Expired,
    Miss,
}

/// The geocode cache.
#[derive(Debug)]
pub struct GeocodeCache {
    entries: HashMap<String, CachedEntry>,
    ttl: Duration,
    capacity: usize,
    evictions: u64,
}

impl GeocodeCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
            evictions: 0,
        }
    }

    /// Look up `address`, replaying a live entry tagged as [`ResultSource::Cache`].
    pub fn get(&mut self, address: &str, now: DateTime<Utc>) -> CacheLookup {
        let key = address.to_lowercase();
        let Some(entry) = self.entries.get_mut(&key) else {
            return CacheLookup::Miss;
        };

        if now - entry.timestamp > self.ttl {
            self.entries.remove(&key);
            return CacheLookup::Expired;
        }

        entry.hits += 1;
        CacheLookup::Hit(GeocodeResult {
            source: ResultSource::Cache,
            cached_from: Some(entry.result.provider()),
            ..entry.result.clone()
        })
    }

    /// Store a result, evicting the oldest tenth first when full.
    pub fn put(&mut self, address: &str, result: &GeocodeResult, now: DateTime<Utc>) {
        let key = address.to_lowercase();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CachedEntry {
                result: result.clone(),
                timestamp: now,
                hits: 0,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let count = (self.entries.len() / 10).max(1);
        let mut by_age: Vec<(DateTime<Utc>, String)> = self
            .entries
            .iter()
            .map(|(k, e)| (e.timestamp, k.clone()))
            .collect();
        by_age.sort();
        for (_, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        self.evictions += count as u64;
    }

    /// Remove every entry older than the TTL. Returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| now - e.timestamp <= ttl);
        before - self.entries.len()
    }

    /// Drop everything. Returns how many entries were held.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Sum of hits over live entries.
    pub fn total_hits(&self) -> u64 {
        self.entries.values().map(|e| e.hits).sum()
    }
}

impl Default for GeocodeCache {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_CACHE_TTL_HOURS), DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::types::{Accuracy, AddressComponents, Coordinates};

    fn result(name: &str, lat: f64, lng: f64) -> GeocodeResult {
        GeocodeResult {
            coordinates: Coordinates::new(lat, lng),
            formatted_address: name.to_string(),
            place_id: None,
            accuracy: Accuracy::High,
            source: ResultSource::Google,
            components: AddressComponents::default(),
            bounding_box: None,
            cached_from: None,
        }
    }

    #[test]
    fn test_cache_put_get() {
        let mut cache = GeocodeCache::default();
        let now = Utc::now();
        cache.put("Stockholm", &result("Stockholm, Sweden", 59.3293, 18.0686), now);

        match cache.get("stockholm", now) {
            CacheLookup::Hit(r) => {
                assert_eq!(r.source, ResultSource::Cache);
                assert_eq!(r.provider(), ResultSource::Google);
                assert_eq!(r.accuracy, Accuracy::High);
                assert_eq!(r.coordinates, Coordinates::new(59.3293, 18.0686));
            }
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(cache.total_hits(), 1);
    }

    #[test]
    fn test_cache_case_insensitive() {
        let mut cache = GeocodeCache::default();
        let now = Utc::now();
        cache.put("new york", &result("New York", 40.7128, -74.006), now);
        assert!(matches!(cache.get("NEW YORK", now), CacheLookup::Hit(_)));
    }

    #[test]
    fn test_cache_miss() {
        let mut cache = GeocodeCache::default();
        assert_eq!(cache.get("nonexistent", Utc::now()), CacheLookup::Miss);
    }

    #[test]
    fn test_expired_entry_evicted() {
        let mut cache = GeocodeCache::default();
        let now = Utc::now();
        cache.put("tokyo", &result("Tokyo", 35.6762, 139.6503), now);

        let later = now + Duration::hours(25);
        assert_eq!(cache.get("tokyo", later), CacheLookup::Expired);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_evicts_oldest_tenth() {
        let mut cache = GeocodeCache::new(Duration::hours(24), 20);
        let start = Utc::now();
        for i in 0..20 {
            let at = start + Duration::seconds(i);
            cache.put(&format!("place {}", i), &result("x", 1.0 + i as f64, 1.0), at);
        }
        assert_eq!(cache.len(), 20);

        // Hitting the oldest entry does not protect it.
        let now = start + Duration::seconds(30);
        assert!(matches!(cache.get("place 0", now), CacheLookup::Hit(_)));

        cache.put("place new", &result("x", 50.0, 1.0), now);
        assert_eq!(cache.len(), 19);
        assert_eq!(cache.evictions(), 2);
        assert_eq!(cache.get("place 0", now), CacheLookup::Miss);
        assert_eq!(cache.get("place 1", now), CacheLookup::Miss);
        assert!(matches!(cache.get("place 2", now), CacheLookup::Hit(_)));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut cache = GeocodeCache::new(Duration::hours(24), 2);
        let now = Utc::now();
        cache.put("a", &result("a", 1.0, 1.0), now);
        cache.put("b", &result("b", 2.0, 2.0), now);
        cache.put("a", &result("a", 3.0, 3.0), now);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.evictions(), 0);
    }

    #[test]
    fn test_purge_and_clear() {
        let mut cache = GeocodeCache::default();
        let now = Utc::now();
        cache.put("old", &result("old", 1.0, 1.0), now - Duration::hours(30));
        cache.put("fresh", &result("fresh", 2.0, 2.0), now);
        assert_eq!(cache.purge_expired(now), 1);
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }
}
