//! Cache client wrapper
//!
//! Every call that talks to the backend is bounded by a timeout and never
//! fails past this boundary: errors become [`CacheLookup::Unavailable`] or
//! [`CacheWrite::Unavailable`]. Callers treat those exactly like a miss.

use super::{CacheBackend, backend_from_url, redact_url};
use crate::CacheError;
use crate::config::CacheConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Result of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    Unavailable,
}

impl<T> CacheLookup<T> {
    pub fn into_hit(self) -> Option<T> {
        match self {
            Self::Hit(v) => Some(v),
            Self::Miss | Self::Unavailable => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Result of a write or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Stored,
    Unavailable,
}

/// Timeout-bounded, failure-absorbing handle on an optional cache backend
#[derive(Clone)]
pub struct CacheClient {
    backend: Option<Arc<dyn CacheBackend>>,
    op_timeout: Duration,
    ping_timeout: Duration,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("op_timeout", &self.op_timeout)
            .field("ping_timeout", &self.ping_timeout)
            .finish()
    }
}

impl CacheClient {
    pub fn new(backend: Arc<dyn CacheBackend>, op_timeout: Duration, ping_timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            op_timeout,
            ping_timeout,
        }
    }

    /// A client with no backend: every read misses, every ping fails
    pub fn disabled() -> Self {
        Self {
            backend: None,
            op_timeout: Duration::ZERO,
            ping_timeout: Duration::ZERO,
        }
    }

    /// Build from configuration. An invalid URL is logged and leaves caching off,
    /// matching how an unreachable cache is handled.
    pub fn from_config(config: &CacheConfig) -> Self {
        let Some(url) = config.url.as_deref() else {
            info!("No cache URL configured, running without cache");
            return Self::disabled();
        };

        match backend_from_url(url) {
            Ok(backend) => {
                info!(url = %redact_url(url), backend = backend.name(), "Cache client configured");
                Self::new(backend, config.op_timeout(), config.ping_timeout())
            }
            Err(e) => {
                warn!(error = %e, "Cache disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn get(&self, key: &str) -> CacheLookup<String> {
        let Some(backend) = &self.backend else {
            return CacheLookup::Unavailable;
        };
        match self.bounded("GET", self.op_timeout, backend.get(key)).await {
            Ok(Some(value)) => CacheLookup::Hit(value),
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                warn!(key, error = %e, "Cache get failed");
                CacheLookup::Unavailable
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheWrite {
        let Some(backend) = &self.backend else {
            return CacheWrite::Unavailable;
        };
        match self
            .bounded("SET", self.op_timeout, backend.set(key, value, ttl))
            .await
        {
            Ok(()) => CacheWrite::Stored,
            Err(e) => {
                warn!(key, error = %e, "Cache set failed");
                CacheWrite::Unavailable
            }
        }
    }

    pub async fn delete(&self, key: &str) -> CacheWrite {
        let Some(backend) = &self.backend else {
            return CacheWrite::Unavailable;
        };
        match self.bounded("DEL", self.op_timeout, backend.delete(key)).await {
            Ok(()) => CacheWrite::Stored,
            Err(e) => {
                warn!(key, error = %e, "Cache delete failed");
                CacheWrite::Unavailable
            }
        }
    }

    /// `false` when the key is absent or the cache cannot be reached
    pub async fn exists(&self, key: &str) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        self.bounded("EXISTS", self.op_timeout, backend.exists(key))
            .await
            .unwrap_or(false)
    }

    /// Liveness of the backend itself; only the health check calls this
    pub async fn ping(&self) -> Result<(), CacheError> {
        let Some(backend) = &self.backend else {
            return Err(CacheError::NotConfigured);
        };
        self.bounded("PING", self.ping_timeout, backend.ping()).await
    }

    /// Read and decode a JSON value. A payload that fails to decode counts as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        match self.get(key).await {
            CacheLookup::Hit(raw) => match serde_json::from_str(&raw) {
                Ok(value) => CacheLookup::Hit(value),
                Err(e) => {
                    warn!(key, error = %e, "Discarding undecodable cache entry");
                    CacheLookup::Miss
                }
            },
            CacheLookup::Miss => CacheLookup::Miss,
            CacheLookup::Unavailable => CacheLookup::Unavailable,
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheWrite {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw, ttl).await,
            Err(e) => {
                warn!(key, error = %e, "Cache value not serializable");
                CacheWrite::Unavailable
            }
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, limit: Duration, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                operation,
                millis: limit.as_millis() as u64,
            }),
        }
    }
}
