//! In-process record cache using DashMap (stands in for Redis)

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use todo_core::ports::cache::CacheResult;
use todo_core::ports::RecordCache;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-memory cache with per-entry TTL
pub struct MemoryCache {
    data: Arc<DashMap<String, CacheEntry>>,
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryCache {
    /// Must be called inside a Tokio runtime (spawns the expiry sweeper)
    pub fn new() -> Self {
        let cache = Self {
            data: Arc::new(DashMap::new()),
        };

        cache.start_cleanup_task();

        cache
    }

    fn get_live(&self, key: &str) -> Option<Vec<u8>> {
        let entry = self.data.get(key)?;
        if Instant::now() < entry.expires_at {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.evict_expired(key);
        None
    }

    /// Remove `key` only if it is still expired; a concurrent `set` wins
    fn evict_expired(&self, key: &str) {
        self.data
            .remove_if(key, |_, entry| Instant::now() >= entry.expires_at);
    }

    fn start_cleanup_task(&self) {
        // Only a weak handle so the sweeper ends once the cache is dropped
        let data = Arc::downgrade(&self.data);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;

                let Some(data) = data.upgrade() else {
                    break;
                };
                let now = Instant::now();
                data.retain(|_, entry| entry.expires_at > now);
            }
        });
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.get_live(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        self.data.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}
