//! Port interfaces for the offline engine
//!
//! Everything the engine touches outside its own process (durable storage,
//! the network, the host application's mutation logic, and domain reads)
//! comes in through one of these traits.

use async_trait::async_trait;
use trailhead_domain::{QueuedAction, Result};

/// Durable key/value storage, enumerable by prefix.
///
/// The engine writes through on every mutation: implementations must make
/// a completed `set` survive a process crash (or say so loudly if they
/// cannot, like an in-memory fallback).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, in no particular order.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Active reachability probes behind the connectivity monitor.
///
/// Both probes are classification, not I/O that can fail: any error or
/// timeout inside the adapter must come back as `false`, never as a panic
/// or an `Err`.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// True when a small external resource is reachable (wide-area
    /// internet). Bounded at 2 seconds by the adapter.
    async fn probe_internet(&self) -> bool;

    /// True when the primary backend answers (local hub reachability,
    /// independent of uplink). Bounded at 3 seconds by the adapter.
    async fn probe_backend(&self) -> bool;
}

/// Executes one queued mutation against the backend.
///
/// The host supplies a single implementation with an exhaustive match over
/// [`trailhead_domain::ActionKind`]. Delivery is at-least-once: a crash
/// between remote success and local removal replays the action, so
/// handlers MUST be idempotent.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, action: &QueuedAction) -> Result<()>;
}

/// Fetches the current records for one cache namespace.
///
/// Returned pairs are `(entry_key, value)`; the engine treats values as
/// opaque payloads for the cache store.
#[async_trait]
pub trait DomainFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<(String, serde_json::Value)>>;
}
