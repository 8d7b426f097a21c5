//! Tiered connectivity monitoring

mod monitor;

pub use monitor::{ConnectivityMonitor, SubscriptionId};
