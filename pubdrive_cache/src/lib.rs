//! Expiring key/value cache with wildcard invalidation.
//!
//! `TtlCache` backs the pubdrive file-operations facade: reads and listings
//! populate it, mutations invalidate the affected entries, and everything
//! else ages out on its own. Lookups self-evict expired entries, so the
//! periodic [`TtlCache::cleanup`] sweep is an optimization, never a
//! correctness requirement.
//!
//! Entries are plain in-memory values owned by one process-wide instance;
//! nothing is ever persisted. Callers that need guaranteed freshness bypass
//! the cache entirely.

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        // `>=` makes a zero TTL expired from the moment of insertion.
        self.created_at.elapsed() >= self.ttl
    }
}

/// Counters reported by [`TtlCache::stats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held, including expired ones not yet evicted.
    pub total_entries: usize,
    /// Entries still inside their TTL.
    pub valid_entries: usize,
}

/// Expiring key→value store.
///
/// Values are cloned out on access, so `V` is typically cheap to clone
/// (`String`, `Vec<_>` of small structs, `Arc<_>`).
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    /// Inserts `value` under `key` with the cache-wide default TTL.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Inserts `value` under `key` with an entry-specific TTL.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Looks up `key`, evicting it first if its TTL has elapsed.
    ///
    /// A miss means the caller must fall back to the backing store.
    pub fn get(&self, key: &str) -> Option<V> {
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    /// Removes `key`. Returns whether an entry was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes every entry whose key matches `pattern`, where `*` stands for
    /// any substring (e.g. `"list:pubky://alice/pub/*"` drops a cached
    /// subtree). Returns the number of entries removed.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern_matches(pattern, key));
        before.saturating_sub(self.entries.len())
    }

    /// Sweeps out all expired entries. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!("cache cleanup removed {removed} expired entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let total_entries = self.entries.len();
        let valid_entries = self
            .entries
            .iter()
            .filter(|entry| !entry.is_expired())
            .count();
        CacheStats {
            total_entries,
            valid_entries,
        }
    }
}

/// Matches `input` against `pattern`, `*` standing for any substring.
fn pattern_matches(pattern: &str, input: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == input,
        Some((head, tail)) => match input.strip_prefix(head) {
            Some(rest) => tail_matches(tail, rest),
            None => false,
        },
    }
}

fn tail_matches(pattern: &str, input: &str) -> bool {
    match pattern.split_once('*') {
        None => input.ends_with(pattern),
        Some(("", tail)) => tail_matches(tail, input),
        Some((head, tail)) => {
            let mut search = input;
            while let Some(idx) = search.find(head) {
                if tail_matches(tail, &search[idx + head.len()..]) {
                    return true;
                }
                search = &search[idx + 1..];
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn hit_within_ttl_then_miss_after() {
        let cache = TtlCache::new(Duration::from_millis(40));
        cache.set("k", "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));

        sleep(Duration::from_millis(60));
        assert_eq!(cache.get("k"), None);
        // The expired entry was evicted by the lookup itself.
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn zero_ttl_is_never_retrievable() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set_with_ttl("k", 1u32, Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn per_entry_ttl_overrides_default() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.set_with_ttl("long", 1u32, Duration::from_secs(60));
        sleep(Duration::from_millis(30));
        assert_eq!(cache.get("long"), Some(1));
    }

    #[test]
    fn pattern_invalidation_scopes_by_prefix() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("list:a/x", 1u32);
        cache.set("list:a/y", 2u32);
        cache.set("file:a/x", 3u32);

        assert_eq!(cache.invalidate_pattern("list:a*"), 2);
        assert_eq!(cache.get("list:a/x"), None);
        assert_eq!(cache.get("list:a/y"), None);
        assert_eq!(cache.get("file:a/x"), Some(3));
    }

    #[test]
    fn pattern_without_wildcard_is_exact() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("list:a", 1u32);
        cache.set("list:ab", 2u32);

        assert_eq!(cache.invalidate_pattern("list:a"), 1);
        assert_eq!(cache.get("list:a"), None);
        assert_eq!(cache.get("list:ab"), Some(2));
    }

    #[test]
    fn wildcard_matcher_handles_inner_stars() {
        assert!(pattern_matches("list:*x", "list:a/x"));
        assert!(pattern_matches("*:a/x", "file:a/x"));
        assert!(pattern_matches("list:*a*", "list:bab"));
        assert!(!pattern_matches("list:*z", "list:a/x"));
        assert!(!pattern_matches("list:a*", "file:a/x"));
    }

    #[test]
    fn cleanup_sweeps_only_expired() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.set("old", 1u32);
        cache.set_with_ttl("fresh", 2u32, Duration::from_secs(60));
        sleep(Duration::from_millis(40));

        assert_eq!(cache.stats().total_entries, 2);
        assert_eq!(cache.stats().valid_entries, 1);
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.stats().total_entries, 1);
        assert_eq!(cache.get("fresh"), Some(2));
    }

    #[test]
    fn clear_drops_everything() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("a", 1u32);
        cache.set("b", 2u32);
        cache.clear();
        assert_eq!(cache.stats().total_entries, 0);
    }
}
