//! Short-lived key/value storage for filevault.
//!
//! Handshake codes and resolved file paths are kept in separate caches so
//! heavy path traffic never crowds out a freshly issued code. The key helpers
//! below namespace the entries.

mod path_cache;

pub use path_cache::{CachedAsset, ResolvedPathCache};

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use moka::Expiry;

use crate::config::CacheConfig;

/// Outcome of [`TtlCache::take_if`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Take {
    /// The entry matched and was removed.
    Taken(String),
    /// The entry exists but did not match; it is left in place.
    Kept(String),
    /// No live entry.
    Missing,
}

/// Key/value store whose entries expire on their own.
pub trait TtlCache: Send + Sync {
    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    fn set(&self, key: &str, value: String, ttl: Duration);

    /// Get a live entry.
    fn get(&self, key: &str) -> Option<String>;

    /// Remove an entry.
    fn delete(&self, key: &str);

    /// Atomically remove the entry if `matches` accepts its value.
    ///
    /// Of several concurrent callers at most one observes `Taken`.
    fn take_if(&self, key: &str, matches: &dyn Fn(&str) -> bool) -> Take;
}

/// Handshake entry key.
pub fn handshake_key(app: &str, code: &str) -> String {
    format!("handshake:{app}:{code}")
}

/// Resolved path key of an image or one of its variants.
pub fn image_key(id: i64, variant: Option<&str>) -> String {
    match variant {
        Some(variant) => format!("image:{id}:{variant}"),
        None => format!("image:{id}"),
    }
}

/// Resolved path key of a document.
pub fn document_key(id: i64) -> String {
    format!("document:{id}")
}

struct PerEntryExpiry;

impl Expiry<String, (String, Duration)> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(String, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &(String, Duration),
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

/// In-process `TtlCache` backed by moka.
#[derive(Clone)]
pub struct MemoryTtlCache {
    cache: Cache<String, (String, Duration)>,
}

impl MemoryTtlCache {
    /// Create a cache holding at most `max_capacity` entries.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .name("filevault")
                .max_capacity(max_capacity)
                .expire_after(PerEntryExpiry)
                .build(),
        }
    }
}

impl TtlCache for MemoryTtlCache {
    fn set(&self, key: &str, value: String, ttl: Duration) {
        self.cache.insert(key.to_string(), (value, ttl));
    }

    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).map(|(value, _)| value)
    }

    fn delete(&self, key: &str) {
        self.cache.invalidate(key);
    }

    fn take_if(&self, key: &str, matches: &dyn Fn(&str) -> bool) -> Take {
        let result = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|entry| match entry {
                Some(entry) if matches(&entry.value().0) => Op::Remove,
                _ => Op::Nop,
            });

        match result {
            CompResult::Removed(entry) => Take::Taken(entry.into_value().0),
            CompResult::Unchanged(entry) => Take::Kept(entry.into_value().0),
            _ => Take::Missing,
        }
    }
}

/// The service's two caches.
#[derive(Clone)]
pub struct Caches {
    /// Resolved asset paths.
    pub paths: Arc<dyn TtlCache>,
    /// Handshake codes.
    pub handshakes: Arc<dyn TtlCache>,
}

impl Caches {
    /// Build both caches with their configured capacities.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            paths: Arc::new(MemoryTtlCache::new(config.max_capacity)),
            handshakes: Arc::new(MemoryTtlCache::new(config.handshake_capacity)),
        }
    }
}

impl std::fmt::Debug for MemoryTtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTtlCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(handshake_key("shop", "abc"), "handshake:shop:abc");
        assert_eq!(image_key(7, None), "image:7");
        assert_eq!(image_key(7, Some("md")), "image:7:md");
        assert_eq!(document_key(3), "document:3");
    }

    #[test]
    fn test_set_get_delete() {
        let cache = MemoryTtlCache::new(100);
        cache.set("a", "1".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some("1".to_string()));

        cache.set("a", "2".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some("2".to_string()));

        cache.delete("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_take_if() {
        let cache = MemoryTtlCache::new(100);
        cache.set("k", "client-1".to_string(), Duration::from_secs(60));

        assert_eq!(
            cache.take_if("k", &|v| v == "client-2"),
            Take::Kept("client-1".to_string())
        );
        assert_eq!(cache.get("k"), Some("client-1".to_string()));

        assert_eq!(
            cache.take_if("k", &|v| v == "client-1"),
            Take::Taken("client-1".to_string())
        );
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.take_if("k", &|_| true), Take::Missing);
    }

    #[test]
    fn test_take_if_single_winner_under_contention() {
        let cache = Arc::new(MemoryTtlCache::new(1_000));
        for round in 0..200 {
            let key = format!("code-{round}");
            cache.set(&key, "client-1".to_string(), Duration::from_secs(60));

            let barrier = Arc::new(std::sync::Barrier::new(4));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    let barrier = Arc::clone(&barrier);
                    let key = key.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        matches!(cache.take_if(&key, &|v| v == "client-1"), Take::Taken(_))
                    })
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|taken| *taken)
                .count();
            assert_eq!(winners, 1, "round {round}");
        }
    }

    #[test]
    fn test_path_pressure_does_not_reject_handshakes() {
        let caches = Caches::from_config(&CacheConfig {
            max_capacity: 10,
            handshake_capacity: 100,
            ..CacheConfig::default()
        });
        let paths = ResolvedPathCache::new(caches.paths.clone(), Duration::from_secs(60));
        for _ in 0..5 {
            for id in 0..20 {
                paths.put(CachedAsset::Document(id), std::path::Path::new("/files/doc"));
                paths.get(CachedAsset::Document(id));
            }
        }

        for n in 0..20 {
            let key = handshake_key("shop", &format!("code-{n}"));
            caches
                .handshakes
                .set(&key, "client-1".to_string(), Duration::from_secs(60));
            assert_eq!(
                caches.handshakes.take_if(&key, &|v| v == "client-1"),
                Take::Taken("client-1".to_string()),
                "code {n}"
            );
        }
    }

    #[test]
    fn test_entries_expire() {
        let cache = MemoryTtlCache::new(100);
        cache.set("short", "x".to_string(), Duration::from_millis(50));
        cache.set("long", "y".to_string(), Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some("y".to_string()));
    }
}
