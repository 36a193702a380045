//! Redis-backed store.
//!
//! One multiplexed connection opened at startup. There is no connection
//! manager: once the socket fails every call reports `StoreUnavailable`
//! and nothing reconnects behind the caller's back.

use super::Store;
use crate::config::RedisSettings;
use crate::error::{Error, Result};
use crate::telemetry::metrics;
use async_trait::async_trait;
use opentelemetry::KeyValue;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

/// Store handle over a single Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    timeout: Duration,
}

impl RedisStore {
    /// Open a connection. Failure is `StoreUnavailable`.
    pub async fn open(settings: &RedisSettings) -> Result<Self> {
        info!(
            host = %settings.host,
            port = settings.port,
            db = settings.db,
            "connecting to redis"
        );

        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(settings.host.clone(), settings.port),
            redis: RedisConnectionInfo {
                db: settings.db,
                password: settings
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret().to_string()),
                ..Default::default()
            },
        };

        let client = Client::open(info).map_err(|e| {
            error!("failed to create redis client: {e}");
            Error::StoreUnavailable(format!("failed to create redis client: {e}"))
        })?;

        let timeout = settings.timeout;
        let conn = tokio::time::timeout(timeout, client.get_multiplexed_tokio_connection())
            .await
            .map_err(|_| {
                Error::StoreUnavailable(format!(
                    "connecting to {}:{} timed out",
                    settings.host, settings.port
                ))
            })?
            .map_err(classify)?;

        Ok(Self { conn, timeout })
    }

    /// Run one command with the configured timeout and error mapping.
    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        let outcome = match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(e)),
            Err(_) => Err(Error::StoreUnavailable(format!(
                "redis {operation} timed out"
            ))),
        };

        metrics::store_operations().add(
            1,
            &[
                KeyValue::new("operation", operation),
                KeyValue::new("result", if outcome.is_ok() { "ok" } else { "error" }),
            ],
        );
        if let Err(ref e) = outcome {
            error!(operation, "redis command failed: {e}");
        }
        outcome
    }
}

/// Connection-level failures are fatal; anything else is a plain store error.
fn classify(e: redis::RedisError) -> Error {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        Error::StoreUnavailable(e.to_string())
    } else {
        Error::Store(e.to_string())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn hget(&self, map: &str, field: &str) -> Result<Option<String>> {
        debug!(map, field, "HGET");
        let mut conn = self.conn.clone();
        self.run("hget", conn.hget(map, field)).await
    }

    async fn hset(&self, map: &str, field: &str, value: &str) -> Result<bool> {
        debug!(map, field, "HSET");
        let mut conn = self.conn.clone();
        let added: i64 = self.run("hset", conn.hset(map, field, value)).await?;
        Ok(added > 0)
    }

    async fn hdel(&self, map: &str, field: &str) -> Result<bool> {
        debug!(map, field, "HDEL");
        let mut conn = self.conn.clone();
        let removed: i64 = self.run("hdel", conn.hdel(map, field)).await?;
        Ok(removed > 0)
    }

    async fn hkeys(&self, map: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        self.run("hkeys", conn.hkeys(map)).await
    }

    async fn hgetall(&self, map: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        self.run("hgetall", conn.hgetall(map)).await
    }

    async fn lpush(&self, list: &str, item: &str) -> Result<()> {
        debug!(list, "LPUSH");
        let mut conn = self.conn.clone();
        let _len: i64 = self.run("lpush", conn.lpush(list, item)).await?;
        Ok(())
    }

    async fn rpop(&self, list: &str) -> Result<Option<String>> {
        debug!(list, "RPOP");
        let mut conn = self.conn.clone();
        self.run("rpop", conn.rpop(list, None)).await
    }

    async fn llen(&self, list: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("llen", conn.llen(list)).await
    }

    async fn del(&self, key: &str) -> Result<bool> {
        debug!(key, "DEL");
        let mut conn = self.conn.clone();
        let removed: i64 = self.run("del", conn.del(key)).await?;
        Ok(removed > 0)
    }

    async fn info(&self) -> Result<String> {
        let mut conn = self.conn.clone();
        self.run("info", redis::cmd("INFO").query_async::<String>(&mut conn))
            .await
    }
}
