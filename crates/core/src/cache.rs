use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Time-boxed snapshot cache keyed by resource id.
///
/// Entries are stamped by the caller; an entry older than the TTL is treated
/// as missing but stays in the map until overwritten or invalidated.
pub struct BookingCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, (V, Instant)>>,
}

impl<K, V> BookingCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let entries = self.entries.read();
        let (value, stamp) = entries.get(key)?;
        self.is_valid_at(*stamp, now).then(|| value.clone())
    }

    pub fn set(&self, key: K, value: V, timestamp: Instant) {
        self.entries.write().insert(key, (value, timestamp));
    }

    pub fn is_valid(&self, timestamp: Instant) -> bool {
        self.is_valid_at(timestamp, Instant::now())
    }

    fn is_valid_at(&self, timestamp: Instant, now: Instant) -> bool {
        now.saturating_duration_since(timestamp) < self.ttl
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for BookingCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl() {
        let cache = BookingCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        cache.set("prof-1", 7, t0);
        assert_eq!(cache.get_at(&"prof-1", t0 + Duration::from_secs(299)), Some(7));
        assert_eq!(cache.get_at(&"prof-2", t0), None);
    }

    #[test]
    fn stale_entries_read_as_missing() {
        let cache = BookingCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        cache.set("prof-1", 7, t0);
        assert_eq!(cache.get_at(&"prof-1", t0 + Duration::from_secs(300)), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn fresh_stamp_is_valid() {
        let cache: BookingCache<&str, ()> = BookingCache::default();
        assert_eq!(cache.ttl(), DEFAULT_TTL);
        assert!(cache.is_valid(Instant::now()));
        let zero: BookingCache<&str, ()> = BookingCache::new(Duration::ZERO);
        assert!(!zero.is_valid(Instant::now()));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = BookingCache::default();
        let now = Instant::now();
        cache.set(1, "a", now);
        cache.set(2, "b", now);
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some("b"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
