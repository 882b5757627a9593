//! Error types for the record service and its adapters

use crate::context::Interrupted;
use thiserror::Error;
use todo_types::ValidationError;

pub type Result<T> = std::result::Result<T, RecordError>;

/// Errors surfaced by [`RecordService`](crate::RecordService) operations.
///
/// Cache failures never appear here; they are reported through
/// [`CachePath::Degraded`](crate::CachePath::Degraded) instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl RecordError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecordError::NotFound(_))
    }
}

/// Errors reported by a [`RecordStore`](crate::ports::RecordStore) adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool exhausted: {0}")]
    PoolTimedOut(String),
}

/// Errors reported by a [`RecordCache`](crate::ports::RecordCache) adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unreachable: {0}")]
    Unreachable(String),

    #[error("Cache value could not be encoded or decoded: {0}")]
    Codec(String),
}

impl From<StoreError> for RecordError {
    fn from(e: StoreError) -> Self {
        RecordError::StoreUnavailable(e.to_string())
    }
}

impl From<Interrupted> for RecordError {
    fn from(e: Interrupted) -> Self {
        RecordError::StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Codec(e.to_string())
    }
}
