//! Cache store implementation
//!
//! Namespaced, TTL-bounded, schema-versioned read cache over a
//! [`KeyValueStore`]. Every miss condition (absent, corrupt, wrong schema
//! version, expired) reads as `None`; the first three also purge the
//! offending entry so storage converges toward only-servable data.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use trailhead_domain::{CacheConfig, CacheEntry, CachePolicy, CacheStats, Result};

use crate::clock::Clock;
use crate::ports::KeyValueStore;

/// Separator between namespace and entry key inside a storage key. Engine
/// keys without it (the queue, the last-sync marker) are not cache entries.
const NAMESPACE_SEPARATOR: char = '/';

/// Namespaced TTL cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    config: CacheConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { inner: Arc::new(CacheInner { config, store, clock }) }
    }

    fn storage_key(&self, namespace: &str, key: &str) -> String {
        format!("{}{}{}{}", self.inner.config.prefix, namespace, NAMESPACE_SEPARATOR, key)
    }

    fn namespace_prefix(&self, namespace: &str) -> String {
        format!("{}{}{}", self.inner.config.prefix, namespace, NAMESPACE_SEPARATOR)
    }

    /// Store a value under `(namespace, key)`.
    ///
    /// The entry is stamped with the current time, the store's schema
    /// version, and an expiry fixed at write time. After the write the
    /// namespace is cleaned up to the policy's cap. Storage failures are
    /// absorbed (the cache is best-effort); only a value that cannot be
    /// serialized is an error.
    pub async fn set<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        policy: CachePolicy,
    ) -> Result<()> {
        let data = serde_json::to_value(value)?;
        let entry = CacheEntry::new(
            data,
            self.inner.clock.now_ms(),
            self.inner.config.schema_version.clone(),
            policy.max_age,
        );
        let json = serde_json::to_string(&entry)?;

        let storage_key = self.storage_key(namespace, key);
        if let Err(error) = self.inner.store.set(&storage_key, &json).await {
            warn!(%error, namespace, key, "Could not write cache entry");
            return Ok(());
        }
        debug!(namespace, key, expires_at = entry.expires_at_ms, "Cache entry stored");

        self.cleanup(namespace, policy.cap).await;
        Ok(())
    }

    /// Read a live value from `(namespace, key)`.
    ///
    /// Returns `None` when the entry is absent, unreadable, written under
    /// another schema version, or past its expiry; the latter three purge
    /// the entry from storage.
    pub async fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let storage_key = self.storage_key(namespace, key);
        let raw = match self.inner.store.get(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                warn!(%error, namespace, key, "Could not read cache entry");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(%error, namespace, key, "Corrupted cache entry, purging");
                self.purge(&storage_key).await;
                return None;
            }
        };

        if entry.schema_version != self.inner.config.schema_version {
            debug!(
                namespace,
                key,
                stored = %entry.schema_version,
                current = %self.inner.config.schema_version,
                "Cache entry from another schema version, purging"
            );
            self.purge(&storage_key).await;
            return None;
        }

        if entry.is_expired(self.inner.clock.now_ms()) {
            debug!(namespace, key, "Cache entry expired, purging");
            self.purge(&storage_key).await;
            return None;
        }

        Some(entry.data)
    }

    /// Drop expired entries in `namespace`, then evict the oldest by
    /// `stored_at` until at most `cap` remain.
    pub async fn cleanup(&self, namespace: &str, cap: usize) {
        let prefix = self.namespace_prefix(namespace);
        let keys = match self.inner.store.keys_with_prefix(&prefix).await {
            Ok(keys) => keys,
            Err(error) => {
                warn!(%error, namespace, "Could not enumerate cache namespace");
                return;
            }
        };

        let now_ms = self.inner.clock.now_ms();
        let mut live: Vec<(String, u64)> = Vec::with_capacity(keys.len());

        for storage_key in keys {
            let raw = match self.inner.store.get(&storage_key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(_) => continue,
            };
            match serde_json::from_str::<CacheEntry<serde_json::Value>>(&raw) {
                Ok(entry) if entry.is_expired(now_ms) => {
                    debug!(key = %storage_key, "Evicting expired cache entry");
                    self.purge(&storage_key).await;
                }
                Ok(entry) => live.push((storage_key, entry.stored_at_ms)),
                Err(_) => {
                    warn!(key = %storage_key, "Purging unreadable cache entry");
                    self.purge(&storage_key).await;
                }
            }
        }

        if live.len() > cap {
            live.sort_by_key(|(_, stored_at)| *stored_at);
            let excess = live.len() - cap;
            debug!(namespace, excess, "Evicting oldest cache entries beyond cap");
            for (storage_key, _) in live.into_iter().take(excess) {
                self.purge(&storage_key).await;
            }
        }
    }

    /// Remove one entry; removing an absent entry is not an error.
    pub async fn remove(&self, namespace: &str, key: &str) {
        self.purge(&self.storage_key(namespace, key)).await;
    }

    /// Remove every cache entry under the engine prefix. Never touches
    /// keys outside the prefix, nor the engine's non-cache keys.
    pub async fn clear(&self) {
        for storage_key in self.cache_keys().await {
            self.purge(&storage_key).await;
        }
    }

    /// Entry count and approximate serialized footprint.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for storage_key in self.cache_keys().await {
            if let Ok(Some(raw)) = self.inner.store.get(&storage_key).await {
                stats.entries += 1;
                stats.total_bytes += raw.len();
            }
        }
        stats
    }

    async fn cache_keys(&self) -> Vec<String> {
        let prefix = &self.inner.config.prefix;
        match self.inner.store.keys_with_prefix(prefix).await {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k[prefix.len()..].contains(NAMESPACE_SEPARATOR))
                .collect(),
            Err(error) => {
                warn!(%error, "Could not enumerate cache keys");
                Vec::new()
            }
        }
    }

    async fn purge(&self, storage_key: &str) {
        if let Err(error) = self.inner.store.remove(storage_key).await {
            warn!(%error, key = %storage_key, "Could not remove cache entry");
        }
    }
}
