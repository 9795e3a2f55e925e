//! Memory port: key/value persistence with optional expiry
//!
//! Memory is how context survives across executions. The agent loop reads it
//! at prompt-build time and writes the final answer at finalization; absence
//! of a memory port, or a failing backend, degrades to "no prior context"
//! rather than an error.

pub mod store;

#[cfg(feature = "redis-memory")]
pub mod redis;

pub use store::InMemoryStore;

#[cfg(feature = "redis-memory")]
pub use redis::RedisMemory;

use crate::error::MemoryError;
use async_trait::async_trait;
use std::time::Duration;

/// Trait for memory backends (the memory port)
///
/// Values are opaque serialized strings and must round-trip `set` → `get`
/// unchanged. Implementations must be safe for concurrent callers.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Fetch a value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, MemoryError>;

    /// Store a value; with a TTL the record becomes invisible after it
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>)
        -> Result<(), MemoryError>;

    /// Remove a value; returns whether anything was removed
    async fn delete(&self, key: &str) -> Result<bool, MemoryError>;
}
