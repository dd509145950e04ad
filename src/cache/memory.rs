//! In-memory cache store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::cache::{now_unix, CacheError, CacheStore, CachedResponse};

#[derive(Debug, Clone)]
struct Entry {
    expires_at: i64,
    value: CachedResponse,
}

/// A thread-safe, bounded cache backed by `DashMap`.
///
/// Expired entries are dropped when read and by the optional sweeper.
/// At capacity, inserting a new key evicts the entry closest to expiry.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, Entry>>,
    max_entries: usize,
}

impl MemoryCache {
    /// Create a new empty cache holding at most `max_entries`.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Remove every entry expired at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.inner.len())
    }

    /// Periodically purge expired entries until shutdown.
    pub async fn run_sweeper(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(interval);
        tracing::info!(interval_secs = interval.as_secs(), "Cache sweeper starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_empty() {
                        continue;
                    }
                    let removed = self.purge_expired(now_unix());
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Purged expired cache entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn evict_one(&self) {
        let victim = self
            .inner
            .iter()
            .min_by_key(|r| r.value().expires_at)
            .map(|r| r.key().clone());
        if let Some(key) = victim {
            self.inner.remove(&key);
            tracing::debug!(key = %key, "Evicted cache entry at capacity");
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, CacheError> {
        let now = now_unix();
        let expired = match self.inner.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
        };
        if expired {
            self.inner.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, expires_at: i64, value: CachedResponse) -> Result<(), CacheError> {
        if !self.inner.contains_key(key) && self.len() >= self.max_entries {
            self.evict_one();
        }
        self.inner.insert(key.to_string(), Entry { expires_at, value });
        Ok(())
    }
}
