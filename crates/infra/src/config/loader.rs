//! Configuration loader
//!
//! Loads engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, applies `TRAILHEAD_*` environment variable overrides on top
//!    of the defaults
//! 2. If no overrides are set, probes for a config file
//! 3. Falls back to the built-in defaults
//!
//! ## Environment Variables
//! - `TRAILHEAD_INTERNET_URL`: Internet probe URL
//! - `TRAILHEAD_BACKEND_URL`: Backend health probe URL
//! - `TRAILHEAD_PROBE_INTERVAL`: Probe interval in seconds
//! - `TRAILHEAD_QUEUE_CAPACITY`: Action queue capacity
//! - `TRAILHEAD_MAX_RETRIES`: Retries before an action permanently fails
//! - `TRAILHEAD_CACHE_PREFIX`: Storage key prefix
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml`
//! 2. `./trailhead.json` or `./trailhead.toml`
//! 3. Parent directory equivalents of the above
//! 4. Relative to the executable location

use std::path::{Path, PathBuf};
use std::time::Duration;

use trailhead_domain::{EngineConfig, Result, TrailheadError};

/// Load configuration with automatic fallback strategy.
///
/// Environment overrides win; otherwise the first config file found is
/// used; otherwise the defaults. The result is always validated.
///
/// # Errors
/// Returns `TrailheadError::Config` if a file is malformed or the
/// resulting configuration fails validation.
pub fn load() -> Result<EngineConfig> {
    let config = match load_from_env()? {
        Some(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        None => match probe_config_paths() {
            Some(path) => load_from_file(Some(path))?,
            None => {
                tracing::debug!("No configuration overrides found, using defaults");
                EngineConfig::default()
            }
        },
    };

    config.validate().map_err(TrailheadError::Config)?;
    Ok(config)
}

/// Apply `TRAILHEAD_*` environment overrides on top of the defaults.
///
/// Returns `Ok(None)` when no relevant variable is set, so the caller can
/// fall through to file loading.
///
/// # Errors
/// Returns `TrailheadError::Config` when a set variable has an invalid
/// value.
pub fn load_from_env() -> Result<Option<EngineConfig>> {
    let mut config = EngineConfig::default();
    let mut any = false;

    if let Some(url) = env_var("TRAILHEAD_INTERNET_URL") {
        config.probe.internet_url = url;
        any = true;
    }
    if let Some(url) = env_var("TRAILHEAD_BACKEND_URL") {
        config.probe.backend_url = url;
        any = true;
    }
    if let Some(seconds) = env_parse::<u64>("TRAILHEAD_PROBE_INTERVAL")? {
        config.probe.interval = Duration::from_secs(seconds);
        any = true;
    }
    if let Some(capacity) = env_parse::<usize>("TRAILHEAD_QUEUE_CAPACITY")? {
        config.queue.max_capacity = capacity;
        any = true;
    }
    if let Some(retries) = env_parse::<u32>("TRAILHEAD_MAX_RETRIES")? {
        config.queue.max_retries = retries;
        any = true;
    }
    if let Some(prefix) = env_var("TRAILHEAD_CACHE_PREFIX") {
        config.cache.prefix = prefix;
        any = true;
    }

    Ok(any.then_some(config))
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations. Supports JSON and
/// TOML, detected by file extension.
///
/// # Errors
/// Returns `TrailheadError::Config` if the file is missing, no candidate
/// is found, or parsing fails.
pub fn load_from_file(path: Option<PathBuf>) -> Result<EngineConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TrailheadError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TrailheadError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TrailheadError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<EngineConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TrailheadError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TrailheadError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TrailheadError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file. Returns the
/// first one that exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("trailhead.json"),
            cwd.join("trailhead.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("trailhead.json"),
                exe_dir.join("trailhead.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| TrailheadError::Config(format!("Invalid value for {key}: {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: &[&str] = &[
        "TRAILHEAD_INTERNET_URL",
        "TRAILHEAD_BACKEND_URL",
        "TRAILHEAD_PROBE_INTERVAL",
        "TRAILHEAD_QUEUE_CAPACITY",
        "TRAILHEAD_MAX_RETRIES",
        "TRAILHEAD_CACHE_PREFIX",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    /// Validates env overrides are applied on top of the defaults.
    ///
    /// Assertions:
    /// - Confirms overridden fields carry the env values.
    /// - Confirms untouched fields keep their defaults.
    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("TRAILHEAD_BACKEND_URL", "http://hub.test/health");
        std::env::set_var("TRAILHEAD_QUEUE_CAPACITY", "50");

        let config = load_from_env().unwrap().expect("overrides not detected");
        assert_eq!(config.probe.backend_url, "http://hub.test/health");
        assert_eq!(config.queue.max_capacity, 50);
        assert_eq!(config.queue.max_retries, 3);

        clear_env();
    }

    /// Validates no relevant env vars yields `None` (fall through).
    #[test]
    fn test_env_absent() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        assert!(load_from_env().unwrap().is_none());
    }

    /// Validates a malformed numeric override is a config error.
    #[test]
    fn test_env_invalid_value() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("TRAILHEAD_PROBE_INTERVAL", "soon");

        let result = load_from_env();
        assert!(matches!(result, Err(TrailheadError::Config(_))));

        clear_env();
    }

    /// Validates loading a JSON config file.
    #[test]
    fn test_load_json_file() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();

        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(loaded, config);
    }

    /// Validates a malformed file is a config error, not a panic.
    #[test]
    fn test_load_malformed_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ nope").unwrap();

        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(TrailheadError::Config(_))));
    }

    /// Validates a missing explicit path is a config error.
    #[test]
    fn test_load_missing_file() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/trailhead.json")));
        assert!(matches!(result, Err(TrailheadError::Config(_))));
    }
}
