//! Sync coordinator
//!
//! Listens to connectivity-tier transitions and turns them into work: a
//! capability increase drains the action queue, and a transition into the
//! full tier additionally refreshes every registered cache namespace and
//! records the sync time. Capability decreases trigger nothing; status
//! observers simply see the new tier.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trailhead_domain::{CachePolicy, ConnectivityStatus, OfflineStatus, Tier};

use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::connectivity::{ConnectivityMonitor, SubscriptionId};
use crate::ports::{DomainFetcher, KeyValueStore};
use crate::queue::ActionQueue;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// One registered cache namespace: where fetched records land and under
/// which freshness policy.
#[derive(Clone)]
pub struct CacheRefreshJob {
    pub namespace: String,
    pub policy: CachePolicy,
    pub fetcher: Arc<dyn DomainFetcher>,
}

struct CoordinatorInner {
    queue: ActionQueue,
    cache: CacheStore,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    /// Full storage key for the last-sync marker.
    last_sync_key: String,
    jobs: SyncMutex<Vec<CacheRefreshJob>>,
    last_sync_ms: SyncMutex<Option<u64>>,
    current: SyncMutex<ConnectivityStatus>,
}

impl CoordinatorInner {
    async fn handle_transition(&self, previous: Tier, status: ConnectivityStatus) {
        *self.current.lock() = status;
        let tier = status.tier();

        if tier <= previous {
            debug!(from = %previous, to = %tier, "Connectivity transition, nothing to sync");
            return;
        }

        info!(from = %previous, to = %tier, "Connectivity improved, syncing");
        self.queue.drain().await;

        if tier == Tier::Full {
            self.refresh_all().await;
        }
    }

    /// Refresh every registered namespace. Jobs run concurrently and
    /// independently; one failure never blocks the others.
    async fn refresh_all(&self) {
        let jobs: Vec<CacheRefreshJob> = self.jobs.lock().clone();
        let results = join_all(jobs.iter().map(|job| self.refresh_job(job))).await;

        let failed = results.iter().filter(|ok| !**ok).count();
        info!(refreshed = results.len() - failed, failed, "Cache refresh complete");

        self.record_sync_time().await;
    }

    async fn refresh_job(&self, job: &CacheRefreshJob) -> bool {
        let records = match job.fetcher.fetch().await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, namespace = %job.namespace, "Namespace refresh failed");
                return false;
            }
        };

        let count = records.len();
        for (key, value) in records {
            if let Err(error) = self.cache.set(&job.namespace, &key, &value, job.policy).await {
                warn!(%error, namespace = %job.namespace, key, "Could not cache fetched record");
            }
        }
        debug!(namespace = %job.namespace, count, "Namespace refreshed");
        true
    }

    async fn record_sync_time(&self) {
        let now_ms = self.clock.now_ms();
        *self.last_sync_ms.lock() = Some(now_ms);
        if let Err(error) = self.store.set(&self.last_sync_key, &now_ms.to_string()).await {
            warn!(%error, "Could not persist last-sync time");
        }
    }
}

/// Drives queue drains and cache refreshes off connectivity transitions.
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
    cancellation_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SyncCoordinator {
    /// Create the coordinator, restoring the last-sync marker from the
    /// store if present.
    pub async fn load(
        queue: ActionQueue,
        cache: CacheStore,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        prefix: &str,
    ) -> Self {
        let last_sync_key =
            format!("{}{}", prefix, trailhead_domain::constants::LAST_SYNC_STORAGE_KEY);

        let last_sync_ms = match store.get(&last_sync_key).await {
            Ok(Some(raw)) => match raw.parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    warn!(raw, "Discarding unreadable last-sync marker");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "Could not read last-sync marker");
                None
            }
        };

        Self {
            inner: Arc::new(CoordinatorInner {
                queue,
                cache,
                store,
                clock,
                last_sync_key,
                jobs: SyncMutex::new(Vec::new()),
                last_sync_ms: SyncMutex::new(last_sync_ms),
                current: SyncMutex::new(ConnectivityStatus::default()),
            }),
            cancellation_token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Register a namespace to refresh on every transition into full
    /// connectivity.
    pub fn register_job(&self, job: CacheRefreshJob) {
        debug!(namespace = %job.namespace, "Cache refresh job registered");
        self.inner.jobs.lock().push(job);
    }

    /// Start consuming statuses. Wire the receiver from a monitor
    /// subscription via [`status_channel`], or drive it directly in tests.
    pub fn start(&mut self, mut status_rx: mpsc::UnboundedReceiver<ConnectivityStatus>) {
        if self.handle.is_some() {
            warn!("Sync coordinator already started");
            return;
        }

        info!("Starting sync coordinator");
        let inner = Arc::clone(&self.inner);
        let token = self.cancellation_token.clone();

        self.handle = Some(tokio::spawn(async move {
            let mut previous = Tier::Offline;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Sync coordinator shutting down");
                        break;
                    }
                    status = status_rx.recv() => {
                        let Some(status) = status else {
                            info!("Status channel closed, sync coordinator exiting");
                            break;
                        };
                        let tier = status.tier();
                        inner.handle_transition(previous, status).await;
                        previous = tier;
                    }
                }
            }
        }));
    }

    /// Stop the transition loop and wait for it to exit.
    pub async fn stop(&mut self) {
        self.cancellation_token.cancel();

        if let Some(handle) = self.handle.take() {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => info!("Sync coordinator stopped"),
                Ok(Err(error)) => warn!(%error, "Sync coordinator task panicked"),
                Err(_) => warn!("Sync coordinator did not stop in time"),
            }
        }
    }

    /// Aggregate snapshot for status banners.
    pub async fn status(&self) -> OfflineStatus {
        let connectivity = *self.inner.current.lock();
        let cache = self.inner.cache.stats().await;
        OfflineStatus {
            connectivity,
            tier: connectivity.tier(),
            queued_actions: self.inner.queue.len().await,
            queued_internet_actions: self.inner.queue.queued_internet_count().await,
            last_sync_time_ms: *self.inner.last_sync_ms.lock(),
            cache_size_human: cache.size_human(),
            cache,
        }
    }

    /// Wipe everything the engine has stored: pending actions, cached
    /// entries, and the last-sync marker.
    pub async fn clear_offline_data(&self) {
        self.inner.queue.clear().await;
        self.inner.cache.clear().await;
        *self.inner.last_sync_ms.lock() = None;
        if let Err(error) = self.inner.store.remove(&self.inner.last_sync_key).await {
            warn!(%error, "Could not remove last-sync marker");
        }
        info!("Offline data cleared");
    }
}

/// Bridge a monitor subscription into the channel `start` consumes.
///
/// The subscription fires immediately with the current status, so the
/// coordinator always sees the starting tier as its first message.
pub fn status_channel(
    monitor: &ConnectivityMonitor,
) -> (SubscriptionId, mpsc::UnboundedReceiver<ConnectivityStatus>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = monitor.subscribe(move |status| {
        let _ = tx.send(status);
    });
    (id, rx)
}
