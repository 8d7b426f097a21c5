//! Shared test doubles
//!
//! In-memory implementations of the engine's ports, used by the unit and
//! integration tests in this crate and by downstream crates' tests. Not
//! gated behind `cfg(test)` so integration tests and the infra crate can
//! reach them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use trailhead_domain::{QueuedAction, Result, TrailheadError};

use crate::ports::{ActionHandler, ConnectivityProbe, DomainFetcher, KeyValueStore};

/// In-memory [`KeyValueStore`] with a switch to make writes fail, for
/// storage-degradation tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw value stored under `key`, bypassing the port.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrailheadError::storage("write failure injected"));
        }
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// [`ConnectivityProbe`] whose answers are flipped from the test body.
#[derive(Default)]
pub struct StaticProbe {
    internet: AtomicBool,
    backend: AtomicBool,
}

impl StaticProbe {
    pub fn new(internet: bool, backend: bool) -> Self {
        Self { internet: AtomicBool::new(internet), backend: AtomicBool::new(backend) }
    }

    pub fn set_internet(&self, reachable: bool) {
        self.internet.store(reachable, Ordering::SeqCst);
    }

    pub fn set_backend(&self, reachable: bool) {
        self.backend.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn probe_internet(&self) -> bool {
        self.internet.load(Ordering::SeqCst)
    }

    async fn probe_backend(&self) -> bool {
        self.backend.load(Ordering::SeqCst)
    }
}

/// [`ActionHandler`] that records every attempt and fails on demand.
#[derive(Default)]
pub struct RecordingHandler {
    attempts: Mutex<Vec<String>>,
    /// Remaining injected failures per action id.
    failures: Mutex<HashMap<String, u32>>,
    fail_all: AtomicBool,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every attempted action, in execution order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    /// Fail the next `times` attempts for `action_id`, then succeed.
    pub fn fail_times(&self, action_id: &str, times: u32) {
        self.failures.lock().insert(action_id.to_string(), times);
    }

    /// Fail every attempt until switched back off.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    async fn execute(&self, action: &QueuedAction) -> Result<()> {
        self.attempts.lock().push(action.id.clone());

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(TrailheadError::Network("handler failure injected".to_string()));
        }

        let mut failures = self.failures.lock();
        if let Some(remaining) = failures.get_mut(&action.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TrailheadError::Network("handler failure injected".to_string()));
            }
        }
        Ok(())
    }
}

/// [`DomainFetcher`] returning a fixed record set, counting calls.
#[derive(Default)]
pub struct StaticFetcher {
    records: Mutex<Vec<(String, serde_json::Value)>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl StaticFetcher {
    pub fn new(records: Vec<(String, serde_json::Value)>) -> Self {
        Self { records: Mutex::new(records), calls: AtomicUsize::new(0), fail: AtomicBool::new(false) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_records(&self, records: Vec<(String, serde_json::Value)>) {
        *self.records.lock() = records;
    }

    /// Make every subsequent fetch fail with a network error.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DomainFetcher for StaticFetcher {
    async fn fetch(&self) -> Result<Vec<(String, serde_json::Value)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrailheadError::Network("fetch failure injected".to_string()));
        }
        Ok(self.records.lock().clone())
    }
}
