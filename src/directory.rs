//! Entity -> queue registrations.
//!
//! The shared hash map in the store is the source of truth. The local cache
//! is filled by `load_all` at startup and updated on every local mutation;
//! lookups read the cache only.

use crate::error::{Error, Result};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub struct QueueDirectory {
    store: Arc<dyn Store>,
    hash_map: String,
    cache: RwLock<HashMap<String, String>>,
}

impl QueueDirectory {
    pub fn new(store: Arc<dyn Store>, hash_map: impl Into<String>) -> Self {
        Self {
            store,
            hash_map: hash_map.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Map `entity` to `queue_base`, replacing any earlier mapping.
    /// Returns true if the entity was not registered before.
    pub async fn register(&self, entity: &str, queue_base: &str) -> Result<bool> {
        if entity.is_empty() {
            return Err(Error::InvalidArgument("entity name is empty".to_string()));
        }
        if queue_base.is_empty() {
            return Err(Error::InvalidArgument("queue name is empty".to_string()));
        }

        let created = self.store.hset(&self.hash_map, entity, queue_base).await?;
        self.cache
            .write()
            .await
            .insert(entity.to_string(), queue_base.to_string());
        info!(
            entity,
            queue = queue_base,
            hash_map = %self.hash_map,
            replaced = !created,
            "registered queue"
        );
        Ok(created)
    }

    /// Remove a registration. Returns the queue base name it mapped to.
    pub async fn delete(&self, entity: &str) -> Result<String> {
        if !self.cache.read().await.contains_key(entity) {
            return Err(Error::UnregisteredEntity(entity.to_string()));
        }

        self.store.hdel(&self.hash_map, entity).await?;
        let queue = self
            .cache
            .write()
            .await
            .remove(entity)
            .ok_or_else(|| Error::UnregisteredEntity(entity.to_string()))?;
        info!(entity, queue = %queue, "removed queue");
        Ok(queue)
    }

    /// Cached queue base name for `entity`. Does not consult the store.
    pub async fn resolve(&self, entity: &str) -> Option<String> {
        self.cache.read().await.get(entity).cloned()
    }

    /// Like `resolve`, failing with `UnregisteredEntity`.
    pub async fn require(&self, entity: &str) -> Result<String> {
        self.resolve(entity)
            .await
            .ok_or_else(|| Error::UnregisteredEntity(entity.to_string()))
    }

    /// Replace the cache with the full contents of the shared hash map.
    pub async fn load_all(&self) -> Result<usize> {
        let queues = self.store.hgetall(&self.hash_map).await?;
        let n = queues.len();
        *self.cache.write().await = queues;
        info!(hash_map = %self.hash_map, queues = n, "loaded queue registrations");
        Ok(n)
    }

    /// Cached registrations, sorted by entity.
    pub async fn entities(&self) -> Vec<(String, String)> {
        let mut all: Vec<_> = self
            .cache
            .read()
            .await
            .iter()
            .map(|(e, q)| (e.clone(), q.clone()))
            .collect();
        all.sort();
        all
    }
}
