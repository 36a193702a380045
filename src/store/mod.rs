//! Key-value store adapter.
//!
//! The queue layer needs only hash fields and lists. Each call is atomic on
//! its own; nothing here spans calls, so composite operations built on top
//! are not atomic as a unit.

pub mod memory;
pub mod redis;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

pub use memory::MemoryStore;
pub use redis::RedisStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Read one hash field.
    async fn hget(&self, map: &str, field: &str) -> Result<Option<String>>;

    /// Write one hash field. Returns true if the field did not exist before.
    async fn hset(&self, map: &str, field: &str, value: &str) -> Result<bool>;

    /// Remove one hash field. Returns true if it was present.
    async fn hdel(&self, map: &str, field: &str) -> Result<bool>;

    /// All field names of a hash.
    async fn hkeys(&self, map: &str) -> Result<Vec<String>>;

    /// All fields and values of a hash.
    async fn hgetall(&self, map: &str) -> Result<HashMap<String, String>>;

    /// Push onto the head of a list, creating it if needed.
    async fn lpush(&self, list: &str, item: &str) -> Result<()>;

    /// Pop from the tail of a list. `None` when the list is empty.
    async fn rpop(&self, list: &str) -> Result<Option<String>>;

    async fn llen(&self, list: &str) -> Result<u64>;

    /// Delete a whole key (hash or list). Returns true if it existed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Connectivity probe; returns the server's info text.
    async fn info(&self) -> Result<String>;
}
