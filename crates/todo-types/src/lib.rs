//! Todo Types - Pure record definitions
//!
//! This crate contains only plain data types and their validation rules,
//! with no async runtime dependencies.

pub mod record;

pub use record::*;

/// Prefix shared by every per-record cache key
pub const RECORD_KEY_PREFIX: &str = "record";

/// Cache key for a record identifier (`record:<id>`)
pub fn record_key(id: i64) -> String {
    format!("{}:{}", RECORD_KEY_PREFIX, id)
}
