//! Redis cache backed by a multiplexed, auto-reconnecting connection

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use todo_core::ports::cache::CacheResult;
use todo_core::ports::RecordCache;
use todo_core::CacheError;

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Accepts either `host:port` or a full `redis://` URL
    pub async fn connect(addr: &str) -> Result<Self> {
        let url = redis_url(addr);
        tracing::info!("Connecting to Redis at {}...", url);

        let client = redis::Client::open(url.as_str())
            .with_context(|| format!("Invalid Redis address: {}", addr))?;
        let conn = ConnectionManager::new(client)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", addr))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl RecordCache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(cache_error)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let ttl_ms = ttl.as_millis().max(1) as u64;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(cache_error)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(cache_error)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Redis ping failed: {}", e);
                false
            }
        }
    }
}

fn redis_url(addr: &str) -> String {
    if addr.starts_with("redis://") || addr.starts_with("rediss://") {
        addr.to_string()
    } else {
        format!("redis://{}/0", addr)
    }
}

fn cache_error(e: redis::RedisError) -> CacheError {
    match e.kind() {
        redis::ErrorKind::TypeError => CacheError::Codec(e.to_string()),
        _ => CacheError::Unreachable(e.to_string()),
    }
}
