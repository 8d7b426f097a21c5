//! Connectivity monitor
//!
//! Periodically probes both reachability levels (wide-area internet and the
//! local backend) and classifies the result into a [`Tier`]. Platform
//! online/offline events are treated as hints that trigger an immediate
//! recheck; they never set the status directly, because a connected Wi-Fi
//! network with no uplink would otherwise report as online.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trailhead_domain::{ConnectivityStatus, ProbeConfig, Tier};

use crate::ports::ConnectivityProbe;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle returned by [`ConnectivityMonitor::subscribe`]; pass it back to
/// `unsubscribe` to detach the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(ConnectivityStatus) + Send + Sync>;

struct MonitorInner {
    probe: Arc<dyn ConnectivityProbe>,
    config: ProbeConfig,
    /// Source of truth for the current status. Starts fully offline until
    /// the first probe cycle completes.
    status_tx: watch::Sender<ConnectivityStatus>,
    subscribers: Mutex<Vec<(u64, Subscriber)>>,
    next_subscription: AtomicU64,
    /// Pinged by `hint_changed` to wake the loop ahead of schedule.
    hint: Notify,
}

impl MonitorInner {
    /// Run both probes concurrently and publish the classification if it
    /// changed.
    async fn recheck(&self) {
        let (has_internet, has_local) =
            tokio::join!(self.probe.probe_internet(), self.probe.probe_backend());
        let status = ConnectivityStatus::new(has_internet, has_local);

        let previous = *self.status_tx.borrow();
        if status == previous {
            debug!(tier = %status.tier(), "Connectivity unchanged");
            return;
        }

        info!(
            from = %previous.tier(),
            to = %status.tier(),
            has_internet = status.has_internet,
            has_local = status.has_local_connectivity,
            "Connectivity tier changed"
        );
        self.status_tx.send_replace(status);
        self.notify_subscribers(status);
    }

    fn notify_subscribers(&self, status: ConnectivityStatus) {
        // Clone the callbacks out so a subscriber that re-enters the
        // monitor (e.g. calls `current`) does not deadlock on the lock.
        let callbacks: Vec<Subscriber> =
            self.subscribers.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            callback(status);
        }
    }
}

/// Tiered connectivity monitor.
///
/// Owns a background probe loop; consumers read [`current`], hold a
/// [`watch`] receiver, or register a callback with [`subscribe`].
///
/// [`current`]: ConnectivityMonitor::current
/// [`subscribe`]: ConnectivityMonitor::subscribe
/// [`watch`]: ConnectivityMonitor::watch
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
    cancellation_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ConnectivityMonitor {
    pub fn new(probe: Arc<dyn ConnectivityProbe>, config: ProbeConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectivityStatus::default());
        Self {
            inner: Arc::new(MonitorInner {
                probe,
                config,
                status_tx,
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(0),
                hint: Notify::new(),
            }),
            cancellation_token: CancellationToken::new(),
            handle: None,
        }
    }

    /// The most recently published status. Fully offline before the first
    /// probe cycle completes.
    pub fn current(&self) -> ConnectivityStatus {
        *self.inner.status_tx.borrow()
    }

    /// Convenience accessor for the derived tier.
    pub fn tier(&self) -> Tier {
        self.current().tier()
    }

    /// A receiver that observes every published status change.
    pub fn watch(&self) -> watch::Receiver<ConnectivityStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Register a status callback.
    ///
    /// The callback is invoked immediately with the current status so the
    /// subscriber never renders a stale default, then again on every
    /// change, in subscription order.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConnectivityStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::SeqCst);
        let callback: Subscriber = Arc::new(callback);
        self.inner.subscribers.lock().push((id, Arc::clone(&callback)));
        callback(self.current());
        SubscriptionId(id)
    }

    /// Detach a previously registered callback. Returns false if the id
    /// was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id.0);
        subscribers.len() != before
    }

    /// Hint that connectivity may have changed (platform online/offline
    /// event, interface change). Wakes the probe loop for an immediate
    /// recheck; the probes remain the sole source of truth.
    pub fn hint_changed(&self) {
        debug!("Connectivity hint received, scheduling recheck");
        self.inner.hint.notify_one();
    }

    /// Run one probe cycle now and publish any change.
    pub async fn recheck(&self) {
        self.inner.recheck().await;
    }

    /// Start the background probe loop. Probes immediately, then on every
    /// interval tick or hint.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            warn!("Connectivity monitor already started");
            return;
        }

        info!(interval = ?self.inner.config.interval, "Starting connectivity monitor");
        let inner = Arc::clone(&self.inner);
        let token = self.cancellation_token.clone();

        self.handle = Some(tokio::spawn(async move {
            inner.recheck().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Connectivity monitor shutting down");
                        break;
                    }
                    _ = inner.hint.notified() => {}
                    _ = tokio::time::sleep(inner.config.interval) => {}
                }
                inner.recheck().await;
            }
        }));
    }

    /// Stop the probe loop and wait for it to exit.
    pub async fn stop(&mut self) {
        self.cancellation_token.cancel();

        if let Some(handle) = self.handle.take() {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => info!("Connectivity monitor stopped"),
                Ok(Err(error)) => warn!(%error, "Connectivity monitor task panicked"),
                Err(_) => warn!("Connectivity monitor did not stop in time"),
            }
        }
    }
}
