use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::Cache;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local TTL cache.
///
/// Expired entries are dropped lazily on read and by [`InMemoryCache::purge_expired`].
/// Uses tokio's clock so paused-time tests can drive expiry.
#[derive(Default)]
pub struct InMemoryCache {
    map: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.map.lock();
        let before = map.len();
        map.retain(|_, e| e.expires_at > now);
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, remaining = map.len(), "purged expired cache entries");
        }
        removed
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut map = self.map.lock();
        let expired = match map.get(key) {
            None => return None,
            Some(e) if e.expires_at > Instant::now() => return Some(e.value.clone()),
            Some(_) => true,
        };
        if expired {
            map.remove(key);
            trace!(key, "cache entry expired");
        }
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.map
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    async fn delete(&self, key: &str) {
        if self.map.lock().remove(key).is_some() {
            trace!(key, "cache entry invalidated");
        }
    }
}
