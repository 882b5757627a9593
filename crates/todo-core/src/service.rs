//! Record service
//!
//! Coordinates the durable store and the read cache. Mutations always hit
//! the store first and only then touch the cache, so a failure between the
//! two steps leaves the cache cold or about to be dropped, never ahead of
//! the store. Cache values are never rewritten in place: an entry is either
//! filled from a store read/write or deleted.

use crate::context::OpContext;
use crate::error::{CacheError, RecordError, Result};
use crate::ports::cache::CacheResult;
use crate::ports::storage::StoreResult;
use crate::ports::{RecordCache, RecordStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use todo_types::{record_key, validate_id, Record, RecordDraft, RecordPatch};
use tracing::{debug, info, warn};

/// Tunables for [`RecordService`]
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Lifetime of a cache entry; bounds how long a racing fill can stay stale
    pub cache_ttl: Duration,
    /// Applied when the caller's context carries no deadline
    pub op_timeout: Duration,
    /// Upper bound for a single cache call; a slower cache counts as unreachable
    pub cache_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            op_timeout: Duration::from_secs(5),
            cache_timeout: Duration::from_millis(250),
        }
    }
}

/// How the cache took part in a successful operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePath {
    /// Served from cache without touching the store
    Hit,
    /// Cache miss; read from the store and cached
    Filled,
    /// New record written through to the cache
    Written,
    /// Entry deleted after a store mutation
    Invalidated,
    /// Cache not consulted
    Bypassed,
    /// The store operation succeeded but a cache step failed
    Degraded(String),
}

impl CachePath {
    pub fn label(&self) -> &'static str {
        match self {
            CachePath::Hit => "hit",
            CachePath::Filled => "filled",
            CachePath::Written => "written",
            CachePath::Invalidated => "invalidated",
            CachePath::Bypassed => "bypassed",
            CachePath::Degraded(_) => "degraded",
        }
    }
}

/// A successful result plus what happened on the cache side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub cache: CachePath,
}

impl<T> Outcome<T> {
    pub fn new(value: T, cache: CachePath) -> Self {
        Self { value, cache }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.cache, CachePath::Degraded(_))
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Reachability of both backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub store: bool,
    pub cache: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.store && self.cache
    }
}

pub struct RecordService {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn RecordCache>,
    config: ServiceConfig,
}

impl RecordService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn RecordCache>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Persist a new record and write it through to the cache
    pub async fn create(&self, ctx: &OpContext, draft: RecordDraft) -> Result<Outcome<Record>> {
        draft.validate()?;
        let ctx = self.bounded(ctx);

        let record = self.store_step(&ctx, self.store.create(&draft)).await?;
        info!("Record {} created", record.id);

        let path = match self.fill(&ctx, &record).await {
            Ok(()) => CachePath::Written,
            Err(e) => degraded("write-through", record.id, e),
        };
        Ok(Outcome::new(record, path))
    }

    /// Cache first; on a miss read the store and fill the cache
    pub async fn get(&self, ctx: &OpContext, id: i64) -> Result<Outcome<Record>> {
        validate_id(id)?;
        let ctx = self.bounded(ctx);
        let key = record_key(id);
        let mut cache_reachable = true;
        let mut degraded_reason = None;

        match self.cache_step(&ctx, self.cache.get(&key)).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Record>(&bytes) {
                Ok(record) => {
                    debug!("Cache hit for {}", key);
                    return Ok(Outcome::new(record, CachePath::Hit));
                }
                Err(e) => {
                    warn!("Dropping undecodable cache entry {}: {}", key, e);
                    if let Err(e) = self.cache_step(&ctx, self.cache.delete(&key)).await {
                        warn!("Failed to drop cache entry {}: {}", key, e);
                    }
                    degraded_reason = Some(CacheError::from(e).to_string());
                }
            },
            Ok(None) => debug!("Cache miss for {}", key),
            Err(e) => {
                warn!("Cache read for {} failed, reading store: {}", key, e);
                cache_reachable = false;
                degraded_reason = Some(e.to_string());
            }
        }

        // The store alone decides NotFound; absence is never cached.
        let record = self
            .store_step(&ctx, self.store.get_by_id(id))
            .await?
            .ok_or(RecordError::NotFound(id))?;

        let path = if cache_reachable {
            match self.fill(&ctx, &record).await {
                Ok(()) => degraded_reason.map_or(CachePath::Filled, CachePath::Degraded),
                Err(e) => degraded("fill", id, e),
            }
        } else {
            CachePath::Degraded(degraded_reason.unwrap_or_default())
        };

        Ok(Outcome::new(record, path))
    }

    /// Always read from the store
    pub async fn list(&self, ctx: &OpContext) -> Result<Outcome<Vec<Record>>> {
        let records = self.store_step(ctx, self.store.list()).await?;
        debug!("Listed {} records from store", records.len());
        Ok(Outcome::new(records, CachePath::Bypassed))
    }

    /// Update in the store, then drop the cache entry
    pub async fn update(
        &self,
        ctx: &OpContext,
        id: i64,
        patch: RecordPatch,
    ) -> Result<Outcome<Record>> {
        validate_id(id)?;
        patch.validate()?;
        let ctx = self.bounded(ctx);

        let record = self
            .store_step(&ctx, self.store.update(id, &patch))
            .await?
            .ok_or(RecordError::NotFound(id))?;
        info!("Record {} updated", id);

        let path = self.invalidate(&ctx, id).await;
        Ok(Outcome::new(record, path))
    }

    /// Delete from the store, then drop the cache entry
    pub async fn delete(&self, ctx: &OpContext, id: i64) -> Result<Outcome<()>> {
        validate_id(id)?;
        let ctx = self.bounded(ctx);

        if !self.store_step(&ctx, self.store.delete(id)).await? {
            return Err(RecordError::NotFound(id));
        }
        info!("Record {} deleted", id);

        let path = self.invalidate(&ctx, id).await;
        Ok(Outcome::new((), path))
    }

    /// Ping both backends
    pub async fn health(&self, ctx: &OpContext) -> HealthReport {
        let checks = async {
            let (store, cache) = tokio::join!(self.store.ping(), self.cache.ping());
            if let Err(ref e) = store {
                warn!("Store health check failed: {}", e);
            }
            HealthReport {
                store: store.is_ok(),
                cache,
            }
        };

        ctx.run(self.config.op_timeout, checks)
            .await
            .unwrap_or(HealthReport {
                store: false,
                cache: false,
            })
    }

    /// Fix the deadline for the whole operation up front
    fn bounded(&self, ctx: &OpContext) -> OpContext {
        ctx.or_timeout(self.config.op_timeout)
    }

    /// Run a store call under the operation deadline
    async fn store_step<T, F>(&self, ctx: &OpContext, op: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        Ok(ctx.run(self.config.op_timeout, op).await??)
    }

    /// Run a cache call within `cache_timeout` and half of the remaining
    /// deadline. Expiry and cancellation come back as `Unreachable`.
    async fn cache_step<T, F>(&self, ctx: &OpContext, op: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let budget = ctx
            .remaining()
            .map_or(self.config.cache_timeout, |left| {
                (left / 2).min(self.config.cache_timeout)
            });

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(CacheError::Unreachable("cancelled".to_string())),
            res = tokio::time::timeout(budget, op) => res.unwrap_or_else(|_| {
                Err(CacheError::Unreachable(format!("timed out after {:?}", budget)))
            }),
        }
    }

    async fn fill(&self, ctx: &OpContext, record: &Record) -> CacheResult<()> {
        let value = serde_json::to_vec(record)?;
        self.cache_step(
            ctx,
            self.cache
                .set(&record_key(record.id), value, self.config.cache_ttl),
        )
        .await
    }

    async fn invalidate(&self, ctx: &OpContext, id: i64) -> CachePath {
        let key = record_key(id);
        match self.cache_step(ctx, self.cache.delete(&key)).await {
            Ok(()) => CachePath::Invalidated,
            Err(e) => degraded("invalidate", id, e),
        }
    }
}

fn degraded(step: &str, id: i64, e: CacheError) -> CachePath {
    warn!("Cache {} for record {} failed: {}", step, id, e);
    CachePath::Degraded(e.to_string())
}
