//! Per-key polling cache with stale-while-revalidate semantics.
//!
//! Each key owns a `CacheEntry` in a `DashMap`. Every state transition
//! (start fetch, apply result, subscribe, release) happens under that
//! entry's shard lock and never across an `.await`, so for a single key the
//! transitions are atomic. Fetches run as spawned tasks bounded by the
//! request timeout; timers are tokio timers, so paused-clock tests drive
//! them deterministically.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use common::{Error, Result};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::fetcher::Fetcher;
use crate::policy::{ResourceKind, RevalidatePolicy};
use crate::subscription::{Snapshot, Subscription};

/// Anything usable as a resource key.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<K> CacheKey for K where K: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Why a fetch was started. Only used for logging.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    Subscribe,
    Interval,
    Manual,
    Focus,
    Supersede,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Trigger::Subscribe => "subscribe",
            Trigger::Interval => "interval",
            Trigger::Manual => "refresh",
            Trigger::Focus => "focus",
            Trigger::Supersede => "supersede",
        }
    }
}

/// Per-key cache slot.
struct CacheEntry<T> {
    data: Option<Arc<T>>,
    error: Option<Arc<Error>>,
    last_fetched_at: Option<Instant>,
    /// Completion of the last attempt, successful or not.
    last_settled_at: Option<Instant>,
    /// Set while a fetch is outstanding.
    in_flight: Option<AbortHandle>,
    /// Bumped on every fetch start; only the latest generation may settle.
    generation: u64,
    subscribers: usize,
    fetcher: Arc<dyn Fetcher<T>>,
    poller: Option<JoinHandle<()>>,
    tx: watch::Sender<Snapshot<T>>,
}

impl<T> CacheEntry<T> {
    fn new(fetcher: Arc<dyn Fetcher<T>>) -> Self {
        let (tx, _) = watch::channel(Snapshot::empty());
        Self {
            data: None,
            error: None,
            last_fetched_at: None,
            last_settled_at: None,
            in_flight: None,
            generation: 0,
            subscribers: 0,
            fetcher,
            poller: None,
            tx,
        }
    }

    fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            value: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.in_flight.is_some() && self.data.is_none(),
            is_validating: self.in_flight.is_some(),
            last_fetched_at: self.last_fetched_at,
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }

    /// When the next interval revalidation is due. A key that never settled
    /// is due immediately.
    fn next_due(&self, interval: Duration) -> Instant {
        match self.last_settled_at {
            Some(at) => at + interval,
            None => Instant::now(),
        }
    }
}

/// Summary counters for heartbeat logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub keys: usize,
    pub subscribed: usize,
    pub with_data: usize,
    pub in_flight: usize,
    pub errored: usize,
}

struct Inner<K, T> {
    name: String,
    policy: RevalidatePolicy,
    request_timeout: Duration,
    entries: DashMap<K, CacheEntry<T>>,
}

/// Polling data cache for one resource kind.
///
/// Cheap to clone; clones share the same entries.
pub struct PollingCache<K, T> {
    inner: Arc<Inner<K, T>>,
}

impl<K, T> Clone for PollingCache<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> PollingCache<K, T>
where
    K: CacheKey,
    T: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, policy: RevalidatePolicy, request_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                policy,
                request_timeout,
                entries: DashMap::new(),
            }),
        }
    }

    /// Cache using the fixed policy of a backend resource kind.
    pub fn for_resource(kind: ResourceKind, request_timeout: Duration) -> Self {
        Self::new(kind.as_str(), kind.policy(), request_timeout)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn policy(&self) -> RevalidatePolicy {
        self.inner.policy
    }

    /// Subscribe to `key`, installing `fetcher` as the key's fetcher.
    ///
    /// A key with no cached value and nothing in flight is fetched right
    /// away; otherwise the cached state is returned as-is.
    pub fn subscribe<F>(&self, key: K, fetcher: F) -> Subscription<K, T>
    where
        F: Fetcher<T>,
    {
        let fetcher: Arc<dyn Fetcher<T>> = Arc::new(fetcher);

        let rx = {
            let mut entry = self.inner.entries.entry(key.clone()).or_insert_with(|| {
                debug!("[{}] new key {:?}", self.inner.name, key);
                CacheEntry::new(Arc::clone(&fetcher))
            });
            entry.fetcher = fetcher;
            entry.subscribers += 1;

            if entry.data.is_none() && entry.in_flight.is_none() {
                self.inner.begin_fetch(&key, &mut entry, Trigger::Subscribe);
            }

            if entry.poller.is_none() {
                let poller = tokio::spawn(poll_loop(
                    Arc::downgrade(&self.inner),
                    key.clone(),
                    entry.tx.subscribe(),
                ));
                entry.poller = Some(poller);
            }

            entry.tx.subscribe()
        };

        Subscription::new(self.clone(), key, rx)
    }

    /// Fetch `key` now unless a fetch is already outstanding.
    /// Returns whether a fetch was started.
    pub fn refresh(&self, key: &K) -> bool {
        let Some(mut entry) = self.inner.entries.get_mut(key) else {
            return false;
        };
        if entry.in_flight.is_some() {
            debug!(
                "[{}] refresh for {:?} ignored: fetch already in flight",
                self.inner.name, key
            );
            return false;
        }
        self.inner.begin_fetch(key, &mut entry, Trigger::Manual);
        true
    }

    /// Fetch `key` now, cancelling any outstanding fetch. The cancelled
    /// request's result is never applied.
    pub fn revalidate_superseding(&self, key: &K) -> bool {
        let Some(mut entry) = self.inner.entries.get_mut(key) else {
            return false;
        };
        self.inner.begin_fetch(key, &mut entry, Trigger::Supersede);
        true
    }

    /// The consuming context became active again. Revalidates every
    /// subscribed key if this cache's policy asks for it.
    /// Returns the number of fetches started.
    pub fn notify_focus_regained(&self) -> usize {
        if !self.inner.policy.revalidate_on_focus {
            return 0;
        }

        let mut started = 0;
        for mut entry in self.inner.entries.iter_mut() {
            if entry.subscribers == 0 || entry.in_flight.is_some() {
                continue;
            }
            let key = entry.key().clone();
            self.inner.begin_fetch(&key, entry.value_mut(), Trigger::Focus);
            started += 1;
        }

        if started > 0 {
            info!(
                "[{}] focus regained: revalidating {} key(s)",
                self.inner.name, started
            );
        }
        started
    }

    /// Current state of `key` without subscribing.
    pub fn peek(&self, key: &K) -> Option<Snapshot<T>> {
        self.inner.entries.get(key).map(|entry| entry.snapshot())
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in self.inner.entries.iter() {
            stats.keys += 1;
            if entry.subscribers > 0 {
                stats.subscribed += 1;
            }
            if entry.data.is_some() {
                stats.with_data += 1;
            }
            if entry.in_flight.is_some() {
                stats.in_flight += 1;
            }
            if entry.error.is_some() {
                stats.errored += 1;
            }
        }
        stats
    }

    /// Called when a subscription is dropped. The last one out stops the
    /// key's revalidation timer; the cached value stays.
    pub(crate) fn release(&self, key: &K) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                if let Some(poller) = entry.poller.take() {
                    poller.abort();
                }
                debug!(
                    "[{}] last subscriber for {:?} gone; polling stopped",
                    self.inner.name, key
                );
            }
        }
    }
}

impl<K, T> Inner<K, T>
where
    K: CacheKey,
    T: Send + Sync + 'static,
{
    /// Start a fetch for `key`. Any outstanding fetch is cancelled and its
    /// generation retired. Caller holds the entry lock.
    fn begin_fetch(self: &Arc<Self>, key: &K, entry: &mut CacheEntry<T>, trigger: Trigger) {
        if let Some(previous) = entry.in_flight.take() {
            previous.abort();
            debug!(
                "[{}] {:?}: cancelled fetch generation {}",
                self.name, key, entry.generation
            );
        }

        entry.generation += 1;
        let generation = entry.generation;
        let fetcher = Arc::clone(&entry.fetcher);
        let inner = Arc::clone(self);
        let task_key = key.clone();
        let timeout = self.request_timeout;

        debug!(
            "[{}] {:?}: starting fetch generation {} ({})",
            self.name,
            key,
            generation,
            trigger.as_str()
        );

        let task = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, fetcher.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(timeout)),
            };
            inner.settle(&task_key, generation, outcome);
        });

        entry.in_flight = Some(task.abort_handle());
        entry.publish();
    }

    /// Apply a fetch result if it belongs to the latest started request.
    fn settle(&self, key: &K, generation: u64, outcome: Result<T>) {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.generation != generation {
            debug!(
                "[{}] {:?}: discarding result of superseded generation {} (latest {})",
                self.name, key, generation, entry.generation
            );
            return;
        }

        let now = Instant::now();
        entry.in_flight = None;
        entry.last_settled_at = Some(now);

        match outcome {
            Ok(value) => {
                debug!("[{}] {:?}: fetch generation {} ok", self.name, key, generation);
                entry.data = Some(Arc::new(value));
                entry.error = None;
                entry.last_fetched_at = Some(now);
            }
            Err(e) => {
                warn!(
                    "[{}] {:?}: fetch failed ({}): {}{}",
                    self.name,
                    key,
                    e.kind(),
                    e,
                    if entry.data.is_some() {
                        "; keeping stale value"
                    } else {
                        ""
                    }
                );
                entry.error = Some(Arc::new(e));
            }
        }

        entry.publish();
    }

    /// Start an interval revalidation if one is due and nothing is in flight.
    fn revalidate_if_due(self: &Arc<Self>, key: &K) {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.subscribers == 0 || entry.in_flight.is_some() {
            return;
        }
        if Instant::now() >= entry.next_due(self.policy.interval) {
            self.begin_fetch(key, &mut entry, Trigger::Interval);
        }
    }
}

/// Revalidation timer for one key. Holds only a weak reference so a
/// dropped cache ends the loop.
async fn poll_loop<K, T>(inner: Weak<Inner<K, T>>, key: K, mut rx: watch::Receiver<Snapshot<T>>)
where
    K: CacheKey,
    T: Send + Sync + 'static,
{
    loop {
        let due = {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let Some(entry) = inner.entries.get(&key) else {
                return;
            };
            if entry.in_flight.is_some() {
                None
            } else {
                Some(entry.next_due(inner.policy.interval))
            }
        };

        match due {
            Some(at) => {
                sleep_until(at).await;
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                inner.revalidate_if_due(&key);
            }
            None => {
                if rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }
}
