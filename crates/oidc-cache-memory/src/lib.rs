//! # oidc-cache-memory
//!
//! In-process [`RequestCache`] backend for `oidc-core`, backed by a
//! concurrent hash map. Suitable for single-instance deployments and tests;
//! multi-instance deployments need a shared backend instead.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::trace;

use oidc_core::cache::RequestCache;
use oidc_core::error::EngineError;

struct CacheEntry {
    payload: Vec<u8>,
    expires_at: OffsetDateTime,
}

/// In-memory request cache.
///
/// Expired entries are dropped lazily on read; long-running hosts should
/// call [`purge_expired`] periodically to reclaim memory for entries that
/// are never read again.
///
/// [`purge_expired`]: MemoryRequestCache::purge_expired
#[derive(Default)]
pub struct MemoryRequestCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryRequestCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - self.entries.len();
        if removed > 0 {
            trace!(removed, "purged expired request cache entries");
        }
        removed
    }
}

#[async_trait]
impl RequestCache for MemoryRequestCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let now = OffsetDateTime::now_utc();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.payload.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            // The ref guard is released above; removing here cannot deadlock.
            self.entries.remove(key);
        }

        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        payload: Vec<u8>,
        expires_at: OffsetDateTime,
    ) -> Result<(), EngineError> {
        self.entries
            .insert(key.to_owned(), CacheEntry { payload, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), EngineError> {
        self.entries.remove(key);
        Ok(())
    }
}
