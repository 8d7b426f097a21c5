//! # Trailhead Core
//!
//! The offline-resilience engine: pure logic, no network or disk code.
//!
//! This crate contains:
//! - The connectivity monitor, action queue, cache store, and sync
//!   coordinator
//! - Port/adapter interfaces (traits) for storage, probes, handlers, and
//!   domain fetchers
//! - A clock abstraction so time-dependent behavior is testable
//!
//! ## Architecture Principles
//! - Only depends on `trailhead-domain`
//! - No HTTP or filesystem code; all external effects via traits
//! - Pure, testable engine logic

pub mod cache;
pub mod clock;
pub mod connectivity;
pub mod coordinator;
pub mod ports;
pub mod queue;
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use cache::CacheStore;
pub use clock::{Clock, MockClock, SystemClock};
pub use connectivity::{ConnectivityMonitor, SubscriptionId};
pub use coordinator::{status_channel, CacheRefreshJob, SyncCoordinator};
pub use ports::{ActionHandler, ConnectivityProbe, DomainFetcher, KeyValueStore};
pub use queue::{ActionQueue, QueueError};
