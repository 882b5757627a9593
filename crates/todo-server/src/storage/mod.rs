//! Storage layer
//!
//! PostgreSQL is the source of truth. Redis (or the in-process
//! DashMap cache) only accelerates reads.

pub mod db;
pub mod memory;
pub mod redis;

pub use db::Database;
pub use memory::MemoryCache;
pub use self::redis::RedisCache;
