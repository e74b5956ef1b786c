use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::StoreResult;

/// When a cache entry should lapse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expiration {
    /// Relative time-to-live.
    Ttl(Duration),
    /// Absolute wall-clock deadline.
    At(DateTime<Utc>),
}

impl Expiration {
    pub fn ttl_secs(secs: u64) -> Self {
        Self::Ttl(Duration::from_secs(secs))
    }
}

/// The key/value store backing the cached data-access layer.
///
/// The cache is never authoritative: callers must treat any entry as
/// potentially absent.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn put(&self, key: &str, value: &str, expiration: Expiration) -> StoreResult<()>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// In-process cache store for tests and local development.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Option<DateTime<Utc>>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some((_, Some(deadline))) if *deadline <= Utc::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, expiration: Expiration) -> StoreResult<()> {
        let deadline = match expiration {
            Expiration::Ttl(ttl) => chrono::Duration::from_std(ttl)
                .ok()
                .map(|ttl| Utc::now() + ttl),
            Expiration::At(at) => Some(at),
        };

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}
