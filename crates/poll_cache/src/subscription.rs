//! Consumer handle onto one cache key.

use std::sync::Arc;

use common::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::cache::{CacheKey, PollingCache};

/// Point-in-time view of a cache entry.
///
/// `value` is the last successful result and survives later failures;
/// `error` is the last failure and is cleared by the next success.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub value: Option<Arc<T>>,
    pub error: Option<Arc<Error>>,
    /// No value yet and a fetch is outstanding.
    pub is_loading: bool,
    /// Any fetch is outstanding, including background revalidation.
    pub is_validating: bool,
    pub last_fetched_at: Option<Instant>,
}

impl<T> Snapshot<T> {
    pub(crate) fn empty() -> Self {
        Self {
            value: None,
            error: None,
            is_loading: false,
            is_validating: false,
            last_fetched_at: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Time since the value was fetched, if there is one.
    pub fn age(&self) -> Option<std::time::Duration> {
        self.last_fetched_at.map(|t| t.elapsed())
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_validating: self.is_validating,
            last_fetched_at: self.last_fetched_at,
        }
    }
}

/// A live subscription. Keeps the key's revalidation timer running until
/// the last subscription for that key is dropped.
pub struct Subscription<K, T>
where
    K: CacheKey,
    T: Send + Sync + 'static,
{
    cache: PollingCache<K, T>,
    key: K,
    rx: watch::Receiver<Snapshot<T>>,
}

impl<K, T> Subscription<K, T>
where
    K: CacheKey,
    T: Send + Sync + 'static,
{
    pub(crate) fn new(cache: PollingCache<K, T>, key: K, rx: watch::Receiver<Snapshot<T>>) -> Self {
        Self { cache, key, rx }
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.rx.borrow().clone()
    }

    /// Fetch now unless a fetch for this key is already outstanding.
    /// Returns whether a new fetch was started.
    pub fn refresh(&self) -> bool {
        self.cache.refresh(&self.key)
    }

    /// Fetch now, cancelling any outstanding fetch for this key.
    pub fn supersede(&self) -> bool {
        self.cache.revalidate_superseding(&self.key)
    }

    /// Wait for the next state change. `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the state satisfies `pred`, checking the current state
    /// first.
    pub async fn wait_for<F>(&mut self, mut pred: F) -> Option<Snapshot<T>>
    where
        F: FnMut(&Snapshot<T>) -> bool,
    {
        let snapshot = self.rx.wait_for(|s| pred(s)).await.ok()?;
        Some(snapshot.clone())
    }
}

impl<K, T> Drop for Subscription<K, T>
where
    K: CacheKey,
    T: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}
