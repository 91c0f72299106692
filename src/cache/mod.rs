//! Cache layer: backends and the degrading client wrapper

mod client;
mod memory;
mod redis_backend;

pub use client::{CacheClient, CacheLookup, CacheWrite};
pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

use crate::CacheError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A key-value store reachable over some transport
///
/// Implementations report failures as `CacheError`; turning them into misses
/// is the job of [`CacheClient`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Build a backend from a cache URL (`redis://`, `rediss://` or `memory://`)
pub fn backend_from_url(url: &str) -> Result<Arc<dyn CacheBackend>, CacheError> {
    if url.starts_with("memory://") {
        Ok(Arc::new(MemoryBackend::new()))
    } else if url.starts_with("redis://") || url.starts_with("rediss://") {
        Ok(Arc::new(RedisBackend::open(url)?))
    } else {
        Err(CacheError::InvalidUrl(redact_url(url)))
    }
}

/// Strip credentials from a URL before it is logged
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
