//! In-Memory Response Cache
//!
//! Default [`ResponseCache`] implementation: a TTL key-value store over a
//! mutex-guarded map. Expired entries are dropped lazily on access and can
//! be swept explicitly with [`MemoryResponseCache::purge_expired`].

use crate::messages::ResponseMessage;
use crate::traits::ResponseCache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct CachedEntry {
    response: ResponseMessage,
    expires_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedEntry>,
    hit_count: u64,
    miss_count: u64,
    expired_count: u64,
}

/// Cache statistics for status reporting.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub expired_count: u64,
}

/// Thread-safe in-memory TTL cache for response messages.
#[derive(Default)]
pub struct MemoryResponseCache {
    state: Mutex<CacheState>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.entries.remove(key);
        }
        state.expired_count += expired.len() as u64;
        if !expired.is_empty() {
            debug!("purged {} expired cache entries", expired.len());
        }
        expired.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.state.lock().unwrap().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        CacheStats {
            entries: state.entries.len() as u64,
            hit_count: state.hit_count,
            miss_count: state.miss_count,
            expired_count: state.expired_count,
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn get(&self, key: &str) -> Option<ResponseMessage> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if let Some(entry) = state.entries.get(key) {
            if entry.expires_at > Instant::now() {
                let response = entry.response.clone();
                state.hit_count += 1;
                return Some(response);
            }
            state.entries.remove(key);
            state.expired_count += 1;
            state.miss_count += 1;
            return None;
        }
        state.miss_count += 1;
        None
    }

    async fn insert(&self, key: &str, response: ResponseMessage, ttl: Duration) {
        let mut state = self.state.lock().unwrap();
        state.entries.insert(
            key.to_string(),
            CachedEntry {
                response,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}
