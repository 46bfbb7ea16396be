/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Cache collaborator used for compiled units.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A key/value cache with per-entry time-to-live.
///
/// TTLs are in seconds: a negative TTL never expires and zero means the
/// service default.
pub trait CacheService: Send + Sync {
    fn put(&self, key: &str, value: Vec<u8>, ttl: i64);

    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn evict(&self, key: &str);

    fn clear(&self);

    fn set_default_ttl(&self, ttl: i64);

    fn startup(&self);

    fn shutdown(&self);
}

/// In-process [`CacheService`].
///
/// Starts running. After [`shutdown`](CacheService::shutdown) every `get`
/// misses and every `put` is dropped until [`startup`](CacheService::startup).
#[derive(Debug)]
pub struct SimpleCacheService {
    state: Mutex<CacheState>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<String, Entry>,
    default_ttl: i64,
    running: bool,
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires: Option<Instant>,
}

/// Default TTL, in seconds.
pub const DEFAULT_TTL: i64 = 60 * 60;

impl SimpleCacheService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                default_ttl: DEFAULT_TTL,
                running: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn put_at(&self, key: &str, value: Vec<u8>, ttl: i64, now: Instant) {
        let mut state = self.lock();
        if !state.running {
            tracing::warn!(key, "cache put after shutdown ignored");
            return;
        }
        let ttl = if ttl == 0 { state.default_ttl } else { ttl };
        let expires = u64::try_from(ttl)
            .ok()
            .map(|secs| now + Duration::from_secs(secs));
        state.entries.insert(key.to_string(), Entry { value, expires });
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Vec<u8>> {
        let mut state = self.lock();
        if !state.running {
            return None;
        }
        let expired = match state.entries.get(key) {
            None => return None,
            Some(entry) => entry.expires.is_some_and(|at| at <= now),
        };
        if expired {
            tracing::trace!(key, "cache entry expired");
            state.entries.remove(key);
            return None;
        }
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SimpleCacheService {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheService for SimpleCacheService {
    fn put(&self, key: &str, value: Vec<u8>, ttl: i64) {
        self.put_at(key, value, ttl, Instant::now());
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.get_at(key, Instant::now())
    }

    fn evict(&self, key: &str) {
        self.lock().entries.remove(key);
    }

    fn clear(&self) {
        self.lock().entries.clear();
    }

    fn set_default_ttl(&self, ttl: i64) {
        // zero would make the default refer to itself
        if ttl != 0 {
            self.lock().default_ttl = ttl;
        }
    }

    fn startup(&self) {
        self.lock().running = true;
    }

    fn shutdown(&self) {
        let mut state = self.lock();
        state.running = false;
        state.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_evict() {
        let cache = SimpleCacheService::new();
        cache.put("a", b"1".to_vec(), 0);
        assert_eq!(cache.get("a"), Some(b"1".to_vec()));
        cache.evict("a");
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_positive_ttl_expires() {
        let cache = SimpleCacheService::new();
        let now = Instant::now();
        cache.put_at("k", vec![1], 10, now);
        assert_eq!(cache.get_at("k", now + Duration::from_secs(9)), Some(vec![1]));
        assert_eq!(cache.get_at("k", now + Duration::from_secs(10)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_negative_ttl_never_expires() {
        let cache = SimpleCacheService::new();
        let now = Instant::now();
        cache.put_at("k", vec![1], -1, now);
        let much_later = now + Duration::from_secs(10 * 365 * 24 * 3600);
        assert_eq!(cache.get_at("k", much_later), Some(vec![1]));
    }

    #[test]
    fn test_zero_ttl_uses_default() {
        let cache = SimpleCacheService::new();
        cache.set_default_ttl(5);
        let now = Instant::now();
        cache.put_at("k", vec![1], 0, now);
        assert_eq!(cache.get_at("k", now + Duration::from_secs(4)), Some(vec![1]));
        assert_eq!(cache.get_at("k", now + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_default_ttl_cannot_be_zero() {
        let cache = SimpleCacheService::new();
        cache.set_default_ttl(0);
        let now = Instant::now();
        cache.put_at("k", vec![1], 0, now);
        assert_eq!(cache.get_at("k", now + Duration::from_secs(60)), Some(vec![1]));
    }

    #[test]
    fn test_shutdown_and_startup() {
        let cache = SimpleCacheService::new();
        cache.put("k", vec![1], -1);
        cache.shutdown();
        assert_eq!(cache.get("k"), None);
        cache.put("k", vec![2], -1);
        assert!(cache.is_empty());

        cache.startup();
        assert_eq!(cache.get("k"), None);
        cache.put("k", vec![3], -1);
        assert_eq!(cache.get("k"), Some(vec![3]));
    }

    #[test]
    fn test_clear() {
        let cache = SimpleCacheService::new();
        cache.put("a", vec![1], -1);
        cache.put("b", vec![2], -1);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
