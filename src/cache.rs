// src/cache.rs
//! In-memory discovery cache keyed by the literal query string.
//!
//! Entries expire after a fixed TTL and are evicted lazily: checked on
//! lookup and swept on insert. No background timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;

use crate::error::{ResearchError, Result};
use crate::research::DiscoveryResult;

pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

#[derive(Debug)]
struct CacheEntry {
    result: Arc<DiscoveryResult>,
    created_at: Instant,
}

/// Thread-safe map of query -> cached discovery.
#[derive(Debug)]
pub struct DiscoveryCache {
    ttl: Duration,
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a fresh discovery, overwriting any entry for the exact same
    /// query string, and sweep expired entries as a side effect.
    pub fn insert(&self, query: &str, result: DiscoveryResult) -> Arc<DiscoveryResult> {
        let result = Arc::new(result);
        let now = Instant::now();
        let mut map = self.inner.lock().expect("cache mutex poisoned");

        let before = map.len();
        map.retain(|_, entry| now.duration_since(entry.created_at) <= self.ttl);
        let evicted = before - map.len();
        if evicted > 0 {
            counter!("discovery_cache_evictions_total").increment(evicted as u64);
            tracing::debug!(target: "cache", evicted, "swept expired discovery entries");
        }

        map.insert(
            query.to_string(),
            CacheEntry {
                result: result.clone(),
                created_at: now,
            },
        );
        result
    }

    /// Look up a cached discovery. Missing entries and expired entries are
    /// distinct, user-correctable failures; expired entries are evicted here.
    pub fn get(&self, query: &str) -> Result<Arc<DiscoveryResult>> {
        let mut map = self.inner.lock().expect("cache mutex poisoned");

        let Some(entry) = map.get(query) else {
            counter!("discovery_cache_misses_total").increment(1);
            return Err(ResearchError::CacheMiss {
                query: query.to_string(),
            });
        };

        let expired = Instant::now().duration_since(entry.created_at) > self.ttl;
        let result = entry.result.clone();

        if expired {
            map.remove(query);
            counter!("discovery_cache_expired_total").increment(1);
            return Err(ResearchError::CacheExpired {
                query: query.to_string(),
                ttl_secs: self.ttl.as_secs(),
            });
        }

        counter!("discovery_cache_hits_total").increment(1);
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
