//! Short-window suppression of repeated deliveries.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Number of most recent buckets kept; older entries are evicted.
const RETAINED_BUCKETS: i64 = 2;

/// Identity of a delivery within a time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// Destination chat channel.
    pub destination: u64,
    /// Event category (e.g. "notification").
    pub category: String,
    /// Coarse time bucket index.
    pub bucket: i64,
}

impl DedupKey {
    /// Create a new key.
    pub fn new(destination: u64, category: impl Into<String>, bucket: i64) -> Self {
        Self {
            destination,
            category: category.into(),
            bucket,
        }
    }
}

/// In-memory set of recently seen [`DedupKey`]s.
///
/// Entries older than two buckets are dropped on every insert, so the set
/// stays bounded by the number of distinct keys seen in the last two windows.
#[derive(Debug)]
pub struct DedupCache {
    bucket_width: Duration,
    seen: Mutex<HashSet<DedupKey>>,
}

impl DedupCache {
    /// Create a cache with the given bucket width.
    pub fn new(bucket_width: Duration) -> Self {
        Self {
            bucket_width,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Bucket width.
    pub fn bucket_width(&self) -> Duration {
        self.bucket_width
    }

    /// Bucket index for `at`.
    pub fn bucket_at(&self, at: DateTime<Utc>) -> i64 {
        let width = self.bucket_width.as_secs().max(1) as i64;
        at.timestamp().div_euclid(width)
    }

    /// Bucket index for the current time.
    pub fn current_bucket(&self) -> i64 {
        self.bucket_at(Utc::now())
    }

    /// Record `key`; returns `true` if it had not been seen before.
    pub fn check_and_insert(&self, key: DedupKey) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let cutoff = key.bucket - RETAINED_BUCKETS;
        seen.retain(|k| k.bucket > cutoff);
        seen.insert(key)
    }

    /// Drop `key` so a later sighting counts as new again.
    pub fn forget(&self, key: &DedupKey) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_first_sighting_then_duplicate() {
        let cache = DedupCache::new(Duration::from_secs(60));
        let key = DedupKey::new(1, "notification", 100);

        assert!(cache.check_and_insert(key.clone()));
        assert!(!cache.check_and_insert(key));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_keys() {
        let cache = DedupCache::new(Duration::from_secs(60));

        assert!(cache.check_and_insert(DedupKey::new(1, "notification", 100)));
        assert!(cache.check_and_insert(DedupKey::new(2, "notification", 100)));
        assert!(cache.check_and_insert(DedupKey::new(1, "other", 100)));
        assert!(cache.check_and_insert(DedupKey::new(1, "notification", 101)));
    }

    #[test]
    fn test_old_buckets_evicted() {
        let cache = DedupCache::new(Duration::from_secs(60));

        cache.check_and_insert(DedupKey::new(1, "notification", 100));
        cache.check_and_insert(DedupKey::new(1, "notification", 101));
        assert_eq!(cache.len(), 2);

        cache.check_and_insert(DedupKey::new(1, "notification", 102));
        // Bucket 100 is two buckets behind and gets dropped.
        assert_eq!(cache.len(), 2);

        cache.check_and_insert(DedupKey::new(1, "notification", 110));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_forget() {
        let cache = DedupCache::new(Duration::from_secs(60));
        let key = DedupKey::new(1, "notification", 100);

        assert!(cache.check_and_insert(key.clone()));
        cache.forget(&key);
        assert!(cache.is_empty());
        assert!(cache.check_and_insert(key));
    }

    #[test]
    fn test_bucket_at() {
        let cache = DedupCache::new(Duration::from_secs(60));
        let t0 = Utc.timestamp_opt(600, 0).unwrap();
        let t1 = Utc.timestamp_opt(659, 0).unwrap();
        let t2 = Utc.timestamp_opt(660, 0).unwrap();

        assert_eq!(cache.bucket_at(t0), 10);
        assert_eq!(cache.bucket_at(t1), 10);
        assert_eq!(cache.bucket_at(t2), 11);
    }

    #[test]
    fn test_zero_width_bucket_does_not_panic() {
        let cache = DedupCache::new(Duration::ZERO);
        let t = Utc.timestamp_opt(42, 0).unwrap();
        assert_eq!(cache.bucket_at(t), 42);
    }
}
