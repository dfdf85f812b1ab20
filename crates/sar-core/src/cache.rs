//! Age and size pruning for concurrent caches.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub trait CacheEntry {
    fn fetched_at(&self) -> Instant;
}

/// Drop entries older than `max_age`, then the oldest entries until at most
/// `max_entries` remain. Returns the number of entries removed.
pub fn prune_cache<K, V>(cache: &DashMap<K, V>, max_entries: usize, max_age: Duration) -> usize
where
    K: Clone + Eq + Hash,
    V: CacheEntry,
{
    prune_cache_at(cache, max_entries, max_age, Instant::now())
}

pub fn prune_cache_at<K, V>(cache: &DashMap<K, V>, max_entries: usize, max_age: Duration, now: Instant) -> usize
where
    K: Clone + Eq + Hash,
    V: CacheEntry,
{
    let mut entries: Vec<(K, Instant)> = cache
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().fetched_at()))
        .collect();

    let mut removed = 0;
    entries.retain(|(key, fetched_at)| {
        if now.saturating_duration_since(*fetched_at) > max_age {
            if cache.remove(key).is_some() {
                removed += 1;
            }
            false
        } else {
            true
        }
    });

    if cache.len() <= max_entries {
        return removed;
    }

    entries.sort_by_key(|(_, fetched_at)| *fetched_at);
    for (key, _) in entries {
        if cache.len() <= max_entries {
            break;
        }
        if cache.remove(&key).is_some() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stamp(Instant);

    impl CacheEntry for Stamp {
        fn fetched_at(&self) -> Instant {
            self.0
        }
    }

    #[test]
    fn expired_entries_are_removed() {
        let now = Instant::now();
        let cache = DashMap::new();
        cache.insert("fresh", Stamp(now));
        if let Some(old) = now.checked_sub(Duration::from_secs(700)) {
            cache.insert("stale", Stamp(old));
            let removed = prune_cache_at(&cache, 10, Duration::from_secs(600), now);
            assert_eq!(removed, 1);
            assert!(cache.contains_key("fresh"));
            assert!(!cache.contains_key("stale"));
        }
    }

    #[test]
    fn oldest_entries_go_first_when_over_capacity() {
        let now = Instant::now();
        let cache = DashMap::new();
        for age in 0..5u64 {
            if let Some(at) = now.checked_sub(Duration::from_secs(age)) {
                cache.insert(age, Stamp(at));
            }
        }
        let before = cache.len();
        let removed = prune_cache_at(&cache, 3, Duration::from_secs(3600), now);
        assert_eq!(removed, before.saturating_sub(3));
        assert!(cache.len() <= 3);
        assert!(cache.contains_key(&0));
    }
}
