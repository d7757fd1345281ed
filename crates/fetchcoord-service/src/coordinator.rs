//! The fetch lifecycle on top of the cache.
//!
//! A [`FetchCoordinator`] decides, based on the cached [`Status`] of a key and whether its
//! [`FetchDescriptor`] is enabled, if a fetch needs to start:
//!
//! | Status          | disabled   | enabled              |
//! |-----------------|------------|----------------------|
//! | absent / Idle   | unchanged  | starts a fetch       |
//! | Loading         | unchanged  | joins the fetch      |
//! | Success         | unchanged  | unchanged            |
//! | Error           | unchanged  | starts a fetch again |
//!
//! A successful value is never refetched on its own. Call [`FetchCoordinator::refetch`], or
//! [`invalidate`](FetchCoordinator::invalidate) and `ensure` again, to get a fresh one.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;

use crate::caching::{
    CacheEntry, CacheStore, Deduplicator, ErrorInfo, Executor, FetchHandle, RequestKey, Status,
    Subscription,
};
use crate::config::Config;

/// How often a single fetch re-invokes its executor after a failure.
///
/// Retries happen within one deduplicated fetch, so observers only see the final outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-invocations after the first failed attempt.
    pub max_retries: usize,
    /// Pause between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::from_secs(1),
        }
    }
}

/// Describes what to fetch for a key, and whether fetching is allowed right now.
pub struct FetchDescriptor<T> {
    key: RequestKey,
    enabled: bool,
    executor: Executor<T>,
}

impl<T> FetchDescriptor<T> {
    /// Creates an enabled descriptor that fetches `key` by calling `fetch`.
    pub fn new<F, Fut>(key: RequestKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ErrorInfo>> + Send + 'static,
    {
        let executor: Executor<T> = Arc::new(move || fetch().boxed());
        Self::from_executor(key, executor)
    }

    pub fn from_executor(key: RequestKey, executor: Executor<T>) -> Self {
        Self {
            key,
            enabled: true,
            executor,
        }
    }

    /// Sets whether the descriptor may start a fetch.
    ///
    /// This is how dependent fetches are expressed, e.g. a detail that must not be fetched before
    /// its id is known.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn executor(&self) -> &Executor<T> {
        &self.executor
    }
}

impl<T> Clone for FetchDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            enabled: self.enabled,
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<T> fmt::Debug for FetchDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchDescriptor")
            .field("key", &self.key)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Issues fetches for keyed resources, caches their outcome and notifies observers.
///
/// The coordinator is cheap to clone, and all clones share the same cache. Typically one is
/// created per resource type at startup and lives for the rest of the process.
pub struct FetchCoordinator<T> {
    store: CacheStore<T>,
    dedup: Deduplicator<T>,
}

impl<T> Clone for FetchCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            dedup: self.dedup.clone(),
        }
    }
}

impl<T> fmt::Debug for FetchCoordinator<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("store", &self.store)
            .field("dedup", &self.dedup)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Default for FetchCoordinator<T> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<T: Send + Sync + 'static> FetchCoordinator<T> {
    pub fn new(retry: RetryPolicy) -> Self {
        let store = CacheStore::new();
        let dedup = Deduplicator::new(store.clone(), retry);
        Self { store, dedup }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fetch.into())
    }

    /// Makes sure the resource of `descriptor` is fetched, or being fetched.
    ///
    /// Nothing happens for a disabled descriptor, or when the key already holds a value.
    /// Otherwise a fetch is started, or the running one joined, and its handle returned. The
    /// handle is only informational: the outcome ends up in the cache either way, and fetch
    /// errors are never returned any other way.
    ///
    /// # Panics
    ///
    /// Panics when a fetch has to start outside of a tokio runtime.
    pub fn ensure(&self, descriptor: &FetchDescriptor<T>) -> Option<FetchHandle<T>> {
        let key = descriptor.key();
        if !descriptor.is_enabled() {
            metric!(counter("coordinator.gated") += 1, "resource" => key.resource());
            return None;
        }

        let status = self.store.status(key);
        metric!(
            counter("coordinator.ensure") += 1,
            "resource" => key.resource(),
            "status" => status.as_str(),
        );

        match status {
            Status::Idle | Status::Error => {
                tracing::debug!(key = %key, %status, "Starting fetch");
                let executor = Arc::clone(descriptor.executor());
                Some(self.dedup.begin_or_join(key.clone(), executor))
            }
            Status::Loading => self.dedup.join(key),
            Status::Success => None,
        }
    }

    /// Drops the cached state of the descriptor's key, then [`ensure`](Self::ensure)s it.
    pub fn refetch(&self, descriptor: &FetchDescriptor<T>) -> Option<FetchHandle<T>> {
        self.invalidate(descriptor.key());
        self.ensure(descriptor)
    }

    pub fn get(&self, key: &RequestKey) -> Option<CacheEntry<T>> {
        self.store.get(key)
    }

    /// See [`CacheStore::subscribe`].
    pub fn subscribe<F>(&self, key: RequestKey, observer: F) -> Subscription
    where
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        self.store.subscribe(key, observer)
    }

    /// Resets `key` to idle.
    ///
    /// A fetch that is still running keeps going, and its outcome overwrites the idle entry.
    pub fn invalidate(&self, key: &RequestKey) {
        self.store.invalidate(key)
    }

    pub fn evict(&self, key: &RequestKey) {
        self.store.evict(key)
    }

    pub fn status(&self, key: &RequestKey) -> Status {
        self.store.status(key)
    }

    pub fn store(&self) -> &CacheStore<T> {
        &self.store
    }

    /// Whether a fetch of `key` is currently running.
    pub fn is_fetching(&self, key: &RequestKey) -> bool {
        self.dedup.in_flight(key)
    }
}
