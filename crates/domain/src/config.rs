//! Engine configuration structures

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Connectivity probing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Small static resource fetched to confirm wide-area internet.
    pub internet_url: String,
    /// Backend endpoint queried to confirm local reachability.
    pub backend_url: String,
    /// Hard bound on the internet probe.
    pub internet_timeout: Duration,
    /// Hard bound on the backend probe.
    pub backend_timeout: Duration,
    /// Interval between periodic rechecks.
    pub interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            internet_url: "https://static.trailhead.app/version.json".to_string(),
            backend_url: "https://hub.local/api/health".to_string(),
            internet_timeout: constants::INTERNET_PROBE_TIMEOUT,
            backend_timeout: constants::BACKEND_PROBE_TIMEOUT,
            interval: constants::PROBE_INTERVAL,
        }
    }
}

/// Action queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Hard cap on queued actions; `enqueue` rejects beyond this.
    pub max_capacity: usize,
    /// Attempts before an action is reported as permanently failed.
    pub max_retries: u32,
    /// Delay before the coalesced follow-up drain pass.
    pub drain_followup_delay: Duration,
    /// Storage key (relative to the engine prefix) holding the queue.
    pub storage_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_capacity: constants::DEFAULT_QUEUE_CAPACITY,
            max_retries: constants::MAX_RETRIES,
            drain_followup_delay: constants::DRAIN_FOLLOWUP_DELAY,
            storage_key: constants::QUEUE_STORAGE_KEY.to_string(),
        }
    }
}

/// Cache store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Fixed prefix isolating engine keys from unrelated storage.
    pub prefix: String,
    /// Current schema version; entries written under another version are
    /// treated as absent.
    pub schema_version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: constants::CACHE_PREFIX.to_string(),
            schema_version: constants::CACHE_SCHEMA_VERSION.to_string(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub probe: ProbeConfig,
    pub queue: QueueConfig,
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.probe.internet_url.is_empty() {
            return Err("Internet probe URL must not be empty".to_string());
        }

        if self.probe.backend_url.is_empty() {
            return Err("Backend probe URL must not be empty".to_string());
        }

        if self.probe.internet_timeout.is_zero() || self.probe.backend_timeout.is_zero() {
            return Err("Probe timeouts must be greater than 0".to_string());
        }

        if self.probe.interval.is_zero() {
            return Err("Probe interval must be greater than 0".to_string());
        }

        if self.queue.max_capacity == 0 {
            return Err("Max capacity must be greater than 0".to_string());
        }

        if self.queue.max_retries == 0 {
            return Err("Max retries must be greater than 0".to_string());
        }

        if self.queue.storage_key.is_empty() {
            return Err("Queue storage key must not be empty".to_string());
        }

        if self.cache.prefix.is_empty() {
            return Err("Cache prefix must not be empty".to_string());
        }

        if self.cache.schema_version.is_empty() {
            return Err("Cache schema version must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `EngineConfig::default` carries the documented bounds.
    ///
    /// Assertions:
    /// - Confirms 2 s / 3 s probe timeouts and the 10 s interval.
    /// - Confirms queue capacity 1000 and 3 retries.
    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();

        assert_eq!(config.probe.internet_timeout, Duration::from_secs(2));
        assert_eq!(config.probe.backend_timeout, Duration::from_secs(3));
        assert_eq!(config.probe.interval, Duration::from_secs(10));
        assert_eq!(config.queue.max_capacity, 1000);
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.queue.drain_followup_delay, Duration::from_secs(1));
        assert_eq!(config.cache.prefix, "trailhead_");
        assert!(config.validate().is_ok());
    }

    /// Validates rejection of a zero queue capacity.
    #[test]
    fn test_validate_zero_capacity() {
        let mut config = EngineConfig::default();
        config.queue.max_capacity = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Max capacity"));
    }

    /// Validates rejection of zero probe timeouts.
    #[test]
    fn test_validate_zero_probe_timeout() {
        let mut config = EngineConfig::default();
        config.probe.internet_timeout = Duration::ZERO;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Probe timeouts"));
    }

    /// Validates rejection of an empty cache prefix.
    #[test]
    fn test_validate_empty_prefix() {
        let mut config = EngineConfig::default();
        config.cache.prefix = String::new();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Cache prefix"));
    }

    /// Validates config round-trips through serde (file-loading path).
    #[test]
    fn test_config_serde_round_trip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
