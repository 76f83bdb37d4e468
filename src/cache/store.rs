//! In-process cache backend with LRU eviction and per-entry TTL.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::time::Instant;

use super::backend::{CacheBackend, CacheError, CachedResponse};
use super::config::CacheConfig;
use super::keys::{CacheKey, Namespace};
use super::lock::rw_write;

const SOURCE: &str = "cache::store";

struct Entry {
    value: CachedResponse,
    expires_at: Instant,
}

pub struct MemoryStore {
    entries: RwLock<LruCache<CacheKey, Entry>>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_write(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let lookup = entries
            .get(key)
            .map(|entry| (entry.expires_at > Instant::now()).then(|| entry.value.clone()));
        match lookup {
            None => Ok(None),
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                entries.pop(key);
                Ok(None)
            }
        }
    }

    async fn put(
        &self,
        key: CacheKey,
        value: CachedResponse,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        rw_write(&self.entries, SOURCE, "put").put(key, entry);
        Ok(())
    }

    async fn invalidate_namespace(&self, namespace: Namespace) -> Result<usize, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate_namespace");
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| key.namespace == namespace)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }
}
