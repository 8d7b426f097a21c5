//! Engine data types

pub mod action;
pub mod cache;
pub mod connectivity;
pub mod status;

pub use action::{ActionKind, PermanentFailure, QueuedAction};
pub use cache::{CacheEntry, CachePolicy, CacheStats};
pub use connectivity::{ConnectivityStatus, Tier};
pub use status::OfflineStatus;
