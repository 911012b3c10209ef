//! DNS response cache with TTL-based expiration and LRU eviction.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use rustc_hash::FxBuildHasher;

use crate::dns::normalize_name;

/// Cache key: case-folded query name plus query type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    domain: String,
    qtype: u16,
}

impl CacheKey {
    pub fn new(domain: &str, qtype: u16) -> Self {
        Self {
            domain: normalize_name(domain).into_owned(),
            qtype,
        }
    }
}

/// A cached response snapshot and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct CacheEntry<M> {
    pub response: M,
    pub expires_at: Instant,
}

impl<M> CacheEntry<M> {
    /// Valid only while `now` is strictly before the expiry.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Bounded TTL cache.
///
/// A single mutex guards the map and its recency list. Expired entries are
/// dropped when a lookup finds them, there is no background sweep.
pub struct DnsCache<M> {
    entries: Mutex<LruCache<CacheKey, CacheEntry<M>, FxBuildHasher>>,
}

impl<M: Clone> DnsCache<M> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::with_hasher(capacity, FxBuildHasher)),
        }
    }

    /// Look up a fresh entry, marking it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<M>> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<CacheEntry<M>> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };

        if let Some(entry) = entries.get(key) {
            if entry.is_fresh(now) {
                return Some(entry.clone());
            }
            entries.pop(key);
        }
        None
    }

    /// Store a response for `ttl_secs` seconds, evicting the least recently
    /// used entry if the cache is full.
    pub fn put(&self, key: CacheKey, response: M, ttl_secs: u32) {
        self.put_at(key, response, ttl_secs, Instant::now());
    }

    pub fn put_at(&self, key: CacheKey, response: M, ttl_secs: u32, now: Instant) {
        let expires_at = now + Duration::from_secs(u64::from(ttl_secs));

        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.put(
            key,
            CacheEntry {
                response,
                expires_at,
            },
        );
    }

    /// Whether an entry (fresh or not) is stored for `key`. Does not touch
    /// recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .lock()
            .map(|e| e.cap().get())
            .unwrap_or(0)
    }
}
