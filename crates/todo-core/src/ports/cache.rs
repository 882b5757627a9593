//! Cache port

use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Key/value accelerator with TTL.
///
/// `get` returns `Ok(None)` for an absent or expired key and `Err` when the
/// backend cannot be reached; callers rely on the two being distinct.
#[async_trait]
pub trait RecordCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Deleting an absent key is not an error
    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn ping(&self) -> bool;
}
