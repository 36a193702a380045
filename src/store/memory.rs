//! In-process store with Redis semantics, for tests and dry runs.

use super::Store;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Keyspace {
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, VecDeque<String>>,
}

/// Shared in-memory keyspace. Clones see the same data, like two clients
/// of one server.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    keys: Arc<RwLock<Keyspace>>,
    offline: Arc<AtomicBool>,
    fail_pushes: Arc<AtomicBool>,
    fail_pops: Arc<AtomicBool>,
    fail_hash_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a lost server: every call fails with `StoreUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make `lpush` fail with a store error while the rest keeps working.
    pub fn set_fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }

    /// Make `rpop` fail with a store error.
    pub fn set_fail_pops(&self, fail: bool) {
        self.fail_pops.store(fail, Ordering::SeqCst);
    }

    /// Make `hset` fail with a store error.
    pub fn set_fail_hash_writes(&self, fail: bool) {
        self.fail_hash_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of keys of any type (test helper).
    pub async fn key_count(&self) -> usize {
        let keys = self.keys.read().await;
        keys.hashes.len() + keys.lists.len()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::StoreUnavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn hget(&self, map: &str, field: &str) -> Result<Option<String>> {
        self.check_online()?;
        let keys = self.keys.read().await;
        Ok(keys.hashes.get(map).and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, map: &str, field: &str, value: &str) -> Result<bool> {
        self.check_online()?;
        if self.fail_hash_writes.load(Ordering::SeqCst) {
            return Err(Error::Store(format!("HSET {map} rejected")));
        }
        let mut keys = self.keys.write().await;
        let prev = keys
            .hashes
            .entry(map.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(prev.is_none())
    }

    async fn hdel(&self, map: &str, field: &str) -> Result<bool> {
        self.check_online()?;
        let mut keys = self.keys.write().await;
        let Some(hash) = keys.hashes.get_mut(map) else {
            return Ok(false);
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            keys.hashes.remove(map);
        }
        Ok(removed)
    }

    async fn hkeys(&self, map: &str) -> Result<Vec<String>> {
        self.check_online()?;
        let keys = self.keys.read().await;
        Ok(keys
            .hashes
            .get(map)
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn hgetall(&self, map: &str) -> Result<HashMap<String, String>> {
        self.check_online()?;
        let keys = self.keys.read().await;
        Ok(keys.hashes.get(map).cloned().unwrap_or_default())
    }

    async fn lpush(&self, list: &str, item: &str) -> Result<()> {
        self.check_online()?;
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(Error::Store(format!("LPUSH {list} rejected")));
        }
        let mut keys = self.keys.write().await;
        keys.lists
            .entry(list.to_string())
            .or_default()
            .push_front(item.to_string());
        Ok(())
    }

    async fn rpop(&self, list: &str) -> Result<Option<String>> {
        self.check_online()?;
        if self.fail_pops.load(Ordering::SeqCst) {
            return Err(Error::Store(format!("RPOP {list} rejected")));
        }
        let mut keys = self.keys.write().await;
        let Some(items) = keys.lists.get_mut(list) else {
            return Ok(None);
        };
        let item = items.pop_back();
        if items.is_empty() {
            keys.lists.remove(list);
        }
        Ok(item)
    }

    async fn llen(&self, list: &str) -> Result<u64> {
        self.check_online()?;
        let keys = self.keys.read().await;
        Ok(keys.lists.get(list).map_or(0, |l| l.len() as u64))
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.check_online()?;
        let mut keys = self.keys.write().await;
        let hash = keys.hashes.remove(key).is_some();
        let list = keys.lists.remove(key).is_some();
        Ok(hash || list)
    }

    async fn info(&self) -> Result<String> {
        self.check_online()?;
        Ok("# Server\r\nredis_mode:memory\r\n".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_is_fifo_across_push_and_pop() {
        let store = MemoryStore::new();
        store.lpush("l", "a").await.unwrap();
        store.lpush("l", "b").await.unwrap();
        assert_eq!(store.llen("l").await.unwrap(), 2);
        assert_eq!(store.rpop("l").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.rpop("l").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.rpop("l").await.unwrap(), None);
        assert_eq!(store.key_count().await, 0);
    }

    #[tokio::test]
    async fn hset_reports_new_fields() {
        let store = MemoryStore::new();
        assert!(store.hset("h", "f", "1").await.unwrap());
        assert!(!store.hset("h", "f", "2").await.unwrap());
        assert_eq!(store.hget("h", "f").await.unwrap().as_deref(), Some("2"));
        assert!(store.hdel("h", "f").await.unwrap());
        assert!(!store.hdel("h", "f").await.unwrap());
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(store.info().await.unwrap_err().is_unavailable());
        assert!(store.llen("l").await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn failure_switches_only_hit_their_command() {
        let store = MemoryStore::new();
        store.lpush("l", "a").await.unwrap();
        store.set_fail_hash_writes(true);
        store.set_fail_pops(true);

        let err = store.hset("h", "f", "1").await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(!err.is_unavailable());
        assert!(matches!(store.rpop("l").await, Err(Error::Store(_))));
        assert_eq!(store.llen("l").await.unwrap(), 1);

        store.set_fail_pops(false);
        assert_eq!(store.rpop("l").await.unwrap().as_deref(), Some("a"));
    }
}
