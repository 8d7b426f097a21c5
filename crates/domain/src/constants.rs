//! Engine constants
//!
//! Centralized location for the timing and sizing constants shared by the
//! connectivity monitor, action queue, and cache store.

use std::time::Duration;

// Connectivity probing
pub const INTERNET_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const BACKEND_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const PROBE_INTERVAL: Duration = Duration::from_secs(10);

// Action queue
pub const MAX_RETRIES: u32 = 3;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DRAIN_FOLLOWUP_DELAY: Duration = Duration::from_secs(1);
pub const QUEUE_STORAGE_KEY: &str = "action_queue";
pub const LAST_SYNC_STORAGE_KEY: &str = "last_sync";

// Cache store
pub const CACHE_PREFIX: &str = "trailhead_";
pub const CACHE_SCHEMA_VERSION: &str = "1.0.0";

// Domain cache policies (max age, cap)
pub const EVENTS_MAX_AGE: Duration = Duration::from_secs(6 * 3600);
pub const EVENTS_CAP: usize = 100;
pub const ANNOUNCEMENTS_MAX_AGE: Duration = Duration::from_secs(2 * 3600);
pub const ANNOUNCEMENTS_CAP: usize = 100;
pub const CHAT_MAX_AGE: Duration = Duration::from_secs(24 * 3600);
pub const CHAT_CAP: usize = 50;
pub const LOCATIONS_MAX_AGE: Duration = Duration::from_secs(6 * 3600);
pub const LOCATIONS_CAP: usize = 1;
pub const WEATHER_MAX_AGE: Duration = Duration::from_secs(30 * 60);
pub const WEATHER_CAP: usize = 50;
pub const MAP_STATE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 3600);
pub const MAP_STATE_CAP: usize = 1;
