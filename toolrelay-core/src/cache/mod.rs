//! Shared key-value cache for discovery results
//!
//! Values are JSON with a per-entry TTL. Expired entries read as absent.

mod file;
mod memory;

pub use file::FileCacheStore;
pub use memory::InMemoryCacheStore;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Key-value store with expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value that expires after `ttl`
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Remove a value (no-op when absent)
    async fn invalidate(&self, key: &str) -> Result<()>;
}
