//! Redis cache backend
//!
//! Uses `redis::aio::ConnectionManager` for a multiplexed connection with
//! automatic reconnection. The first connection is made lazily, so a Redis
//! that is down at start-up is picked up once it becomes reachable.

use super::{CacheBackend, redact_url};
use crate::CacheError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub struct RedisBackend {
    client: redis::Client,
    url: String,
    connection: OnceCell<ConnectionManager>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("url", &self.url)
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

impl RedisBackend {
    /// Parse the URL; no network I/O happens here
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::InvalidUrl(format!("{}: {e}", redact_url(url))))?;
        Ok(Self {
            client,
            url: redact_url(url),
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| CacheError::Connection(e.to_string()))?;
                info!(url = %self.url, "Redis connection established");
                Ok::<_, CacheError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("GET", e))?;

        debug!(key, hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        if ttl.is_zero() {
            let _: () = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::backend("SET", e))?;
        } else {
            let ttl_seconds = ttl.as_secs().max(1);
            let _: () = redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_seconds)
                .arg(value)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::backend("SETEX", e))?;
        }

        debug!(key, "Redis SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("DEL", e))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("EXISTS", e))?;
        Ok(count > 0)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("PING", e))?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::UnexpectedReply("PING"))
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
