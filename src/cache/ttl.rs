//! In-memory, time-bounded memoization keyed by opaque strings.
//!
//! Entries are stamped on `set` and reported absent by `get` once older than the TTL.
//! Stale entries are not swept; they stay in the map until the key is written again.

use super::clock::Clock;
use crate::models::{RankingKind, RankingReport};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// Matches the upstream refresh cadence.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached value and the moment it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: DateTime<Utc>,
}

/// Thread-safe TTL cache. Simultaneous writers to one key never tear an entry;
/// the last write wins.
#[derive(Debug)]
pub struct TtlCache<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Returns the value for `key` if present and not older than the TTL.
    pub fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if self.is_expired(entry, self.clock.now()) {
            debug!("Cache entry '{}' found but expired", key);
            return None;
        }
        debug!("Cache hit for '{}'", key);
        Some(entry.value.clone())
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
        };
        debug!("Caching '{}' for {:?}", key, self.ttl);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn is_expired(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        // A clock that stepped backwards yields a negative age; treat it as fresh.
        match (now - entry.inserted_at).to_std() {
            Ok(age) => age > self.ttl,
            Err(_) => false,
        }
    }
}

/// Cache fronting the ranking engine.
pub type RankingCache = TtlCache<RankingReport>;

/// Key under which a ranking of `kind` truncated to `limit` is cached.
pub fn ranking_cache_key(kind: RankingKind, limit: usize) -> String {
    format!("rankings-{}-{}", kind, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::TimeZone;
    use std::thread;

    fn cache_with_clock(ttl_secs: u64) -> (TtlCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0).unwrap(),
        ));
        let cache = TtlCache::with_clock(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let (cache, _) = cache_with_clock(300);
        cache.set("k", "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_entry_expires_but_stays_stored() {
        let (cache, clock) = cache_with_clock(300);
        cache.set("k", "v".to_string());

        clock.advance(chrono::Duration::seconds(300));
        assert_eq!(cache.get("k"), Some("v".to_string()), "exactly at TTL is fresh");

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 1, "stale entry is kept until overwritten");

        cache.set("k", "w".to_string());
        assert_eq!(cache.get("k"), Some("w".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_backwards_clock_keeps_entry_fresh() {
        let (cache, clock) = cache_with_clock(60);
        cache.set("k", "v".to_string());
        clock.advance(chrono::Duration::seconds(-30));
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_last_write_wins_under_contention() {
        let (cache, _) = cache_with_clock(300);
        let cache = Arc::new(cache);
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..100 {
                        cache.set("shared", format!("writer-{}", i));
                        let _ = cache.get("shared");
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        let value = cache.get("shared").unwrap();
        assert!(value.starts_with("writer-"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_and_key_format() {
        let (cache, _) = cache_with_clock(10);
        cache.set(ranking_cache_key(RankingKind::Worst, 5), "x".to_string());
        assert!(cache.get("rankings-worst-5").is_some());
        cache.clear();
        assert!(cache.is_empty());
    }
}
