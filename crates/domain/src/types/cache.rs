//! Cache entry and policy types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Envelope persisted around every cached value.
///
/// `expires_at_ms` is fixed at write time (`stored_at_ms + max_age`); reads
/// never extend a lifetime. An entry whose `schema_version` no longer
/// matches the store's current version is treated as absent, forcing a
/// refetch after an app upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    #[serde(rename = "storedAt")]
    pub stored_at_ms: u64,
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "expiresAt")]
    pub expires_at_ms: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, stored_at_ms: u64, schema_version: String, max_age: Duration) -> Self {
        let expires_at_ms = stored_at_ms.saturating_add(max_age.as_millis() as u64);
        Self { data, stored_at_ms, schema_version, expires_at_ms }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Per-namespace freshness and size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// How long an entry stays servable after being stored.
    pub max_age: Duration,
    /// Maximum number of live entries in the namespace; the oldest by
    /// `stored_at` are evicted beyond this.
    pub cap: usize,
}

impl CachePolicy {
    pub const fn new(max_age: Duration, cap: usize) -> Self {
        Self { max_age, cap }
    }

    /// Domain events feed: 6 hours, up to 100 entries.
    pub const fn events() -> Self {
        Self::new(constants::EVENTS_MAX_AGE, constants::EVENTS_CAP)
    }

    /// Announcements feed: 2 hours, up to 100 entries.
    pub const fn announcements() -> Self {
        Self::new(constants::ANNOUNCEMENTS_MAX_AGE, constants::ANNOUNCEMENTS_CAP)
    }

    /// Per-channel chat history: 24 hours, up to 50 entries.
    pub const fn chat() -> Self {
        Self::new(constants::CHAT_MAX_AGE, constants::CHAT_CAP)
    }

    /// Location directory: 6 hours, a single entry.
    pub const fn locations() -> Self {
        Self::new(constants::LOCATIONS_MAX_AGE, constants::LOCATIONS_CAP)
    }

    /// Weather snapshots keyed by location: 30 minutes, up to 50 entries.
    pub const fn weather() -> Self {
        Self::new(constants::WEATHER_MAX_AGE, constants::WEATHER_CAP)
    }

    /// Map view-state (center/zoom): 7 days, a single entry.
    pub const fn map_state() -> Self {
        Self::new(constants::MAP_STATE_MAX_AGE, constants::MAP_STATE_CAP)
    }
}

/// Observability snapshot of the cache footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    /// Approximate serialized size of all entries, in bytes.
    pub total_bytes: usize,
}

impl CacheStats {
    /// Human-readable footprint for UI banners, e.g. "cache ≈ 240 KB".
    pub fn size_human(&self) -> String {
        let kb = self.total_bytes / 1024;
        if kb < 1024 {
            format!("{} KB", kb)
        } else {
            format!("{:.1} MB", kb as f64 / 1024.0)
        }
    }
}
