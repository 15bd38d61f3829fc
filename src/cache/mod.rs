//! Validation-token response cache
//!
//! Maps a cacheable request identity (method and resolved URL) to the last
//! validated payload and the validation token it came with. Entries are
//! overwritten on every fresh response and never evicted: the cache lives as
//! long as its owner and is not bounded.

use crate::types::{JsonValue, Method};
use dashmap::DashMap;

/// Identity of a cacheable request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub url: String,
}

impl CacheKey {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }
}

/// Last known representation of a resource
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Opaque server-issued token (entity tag)
    pub etag: String,
    /// Validated payload
    pub payload: JsonValue,
}

/// Process-lifetime store of validated payloads
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored entry for `key`
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Stored token for `key`
    pub fn etag(&self, key: &CacheKey) -> Option<String> {
        self.entries.get(key).map(|entry| entry.etag.clone())
    }

    /// Store or overwrite the entry for `key`; last writer wins
    pub fn insert(&self, key: CacheKey, etag: impl Into<String>, payload: JsonValue) {
        self.entries.insert(
            key,
            CacheEntry {
                etag: etag.into(),
                payload,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
