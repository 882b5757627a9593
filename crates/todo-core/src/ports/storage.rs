//! Durable store port

use crate::error::StoreError;
use async_trait::async_trait;
use todo_types::{Record, RecordDraft, RecordPatch};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Source of truth for records.
///
/// Implementations assign identifiers and timestamps and must provide
/// read-your-writes consistency within a single session.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, draft: &RecordDraft) -> StoreResult<Record>;

    /// `Ok(None)` when no record has this id
    async fn get_by_id(&self, id: i64) -> StoreResult<Option<Record>>;

    async fn list(&self) -> StoreResult<Vec<Record>>;

    /// `Ok(None)` when no record has this id
    async fn update(&self, id: i64, patch: &RecordPatch) -> StoreResult<Option<Record>>;

    /// `Ok(false)` when no record has this id
    async fn delete(&self, id: i64) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}
