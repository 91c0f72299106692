//! In-process cache backend
//!
//! Entries carry an absolute expiry in Unix milliseconds (0 = never expire).
//! They are removed lazily on access, and every `SWEEP_EVERY` writes the whole
//! map is swept so keys that are never read again do not pile up.

use super::CacheBackend;
use crate::CacheError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SWEEP_EVERY: u64 = 256;

#[derive(Debug, Clone)]
struct Entry {
    expire_at: u64,
    data: String,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        self.expire_at != 0 && now >= self.expire_at
    }
}

/// Map-backed cache; used for `memory://` and in tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = current_millis();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = current_millis();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let now = current_millis();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.data.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            expire_at: expire_at(ttl),
            data: value.to_string(),
        };
        self.entries.lock().insert(key.to_string(), entry);

        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lookup(key).is_some())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Absolute expiry for a TTL; a zero TTL never expires
fn expire_at(ttl: Duration) -> u64 {
    if ttl.is_zero() {
        0
    } else {
        current_millis().saturating_add(ttl.as_millis() as u64)
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
