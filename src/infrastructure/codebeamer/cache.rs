use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    data: serde_json::Value,
    created_at: Instant,
}

/// TTL cache for GET responses, keyed by endpoint and query params.
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    hits: usize,
    misses: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
}

impl ResponseCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: Duration::from_secs(ttl_secs),
            hits: 0,
            misses: 0,
        }
    }

    pub fn make_key(endpoint: &str, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        for (key, value) in sorted {
            hasher.update(b"\0");
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        let fresh = self
            .entries
            .get(key)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.data.clone());

        if fresh.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
            self.entries.remove(key);
        }
        fresh
    }

    /// Expired entries are purged on every insert so the map stays bounded by live keys.
    pub fn insert(&mut self, key: String, data: serde_json::Value) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        self.entries.insert(
            key,
            CacheEntry {
                data,
                created_at: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            cache_hits: self.hits,
            cache_misses: self.misses,
            cache_hit_rate: if total > 0 {
                self.hits as f64 / total as f64
            } else {
                0.0
            },
            cache_size: self.entries.len(),
        }
    }
}
