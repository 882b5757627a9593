//! Todo Core Library
//!
//! Error taxonomy, adapter ports and the cache-consistent record service.

// Re-export pure types from todo-types
pub use todo_types::*;

pub mod context;
pub mod error;
pub mod ports;
pub mod service;

pub use context::{Interrupted, OpContext};
pub use error::{CacheError, RecordError, Result, StoreError};
pub use service::{CachePath, HealthReport, Outcome, RecordService, ServiceConfig};
