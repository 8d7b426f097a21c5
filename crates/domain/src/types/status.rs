//! UI-facing engine status snapshot

use serde::{Deserialize, Serialize};

use super::cache::CacheStats;
use super::connectivity::{ConnectivityStatus, Tier};

/// Aggregate snapshot for status banners: tier, queue depth, cache footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineStatus {
    pub connectivity: ConnectivityStatus,
    pub tier: Tier,
    /// Total actions waiting in the queue.
    pub queued_actions: usize,
    /// Subset of queued actions that need full internet.
    pub queued_internet_actions: usize,
    /// Epoch millis of the last completed cache refresh batch, if any.
    pub last_sync_time_ms: Option<u64>,
    pub cache: CacheStats,
    /// Human-readable cache footprint, e.g. "240 KB".
    pub cache_size_human: String,
}
