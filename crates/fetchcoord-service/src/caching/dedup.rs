use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared, TryFutureExt};
use parking_lot::Mutex;
use sentry::{Hub, SentryFutureExt};

use super::{CacheEntry, CacheStore, ErrorInfo, FetchResult, RequestKey, Status};
use crate::coordinator::RetryPolicy;
use crate::utils::futures::CallOnDrop;

/// Performs the actual remote fetch of one resource.
///
/// An executor may be invoked more than once over the lifetime of a key, but never while a
/// previous invocation for the same key is still pending.
pub type Executor<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ErrorInfo>> + Send + Sync>;

type ComputationChannel<T> = Shared<oneshot::Receiver<FetchResult<T>>>;
type ComputationMap<T> = Arc<Mutex<BTreeMap<RequestKey, ComputationChannel<T>>>>;

/// Makes sure there is at most one in-flight fetch per [`RequestKey`].
///
/// A fetch marks its key [`Loading`](super::Status::Loading) when it starts and writes the
/// outcome into the [`CacheStore`] when it resolves. Everyone who asked for the key in between
/// shares that single outcome.
pub struct Deduplicator<T> {
    store: CacheStore<T>,

    /// The running fetches, keyed by what they fetch.
    current_computations: ComputationMap<T>,

    retry: RetryPolicy,
}

impl<T> Clone for Deduplicator<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            current_computations: Arc::clone(&self.current_computations),
            retry: self.retry,
        }
    }
}

impl<T> fmt::Debug for Deduplicator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = self
            .current_computations
            .try_lock()
            .map(|c| c.len())
            .unwrap_or_default();
        f.debug_struct("Deduplicator")
            .field("running fetches", &running)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Deduplicator<T> {
    pub fn new(store: CacheStore<T>, retry: RetryPolicy) -> Self {
        Self {
            store,
            current_computations: Default::default(),
            retry,
        }
    }

    /// Starts fetching `key` with `executor`, or joins the fetch that is already running.
    ///
    /// Both the initiator and everyone who joined resolve with the same result. The `executor` of
    /// a joining call is not used. If the entry already holds a value, that value is returned and
    /// nothing is fetched.
    ///
    /// NOTE: This function itself is *not* `async`, because it should eagerly spawn the fetch,
    /// even if the returned handle is never awaited.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn begin_or_join(&self, key: RequestKey, executor: Executor<T>) -> FetchHandle<T> {
        let (sender, channel) = {
            let mut current_computations = self.current_computations.lock();
            if let Some(channel) = current_computations.get(&key) {
                // A concurrent fetch was deduplicated.
                metric!(counter("dedup.channel.hit") += 1, "resource" => key.resource());
                let channel = channel.clone();
                drop(current_computations);

                // The entry may have been invalidated while the fetch is running. Once the fetch
                // has stored its result, it is no longer in flight and the entry stays as is.
                self.store.locked(|| {
                    if self.in_flight(&key) {
                        self.store.mark_loading(&key, &[Status::Idle]);
                    }
                });
                return FetchHandle::from_channel(key, channel);
            }
            metric!(counter("dedup.channel.miss") += 1, "resource" => key.resource());

            let (sender, receiver) = oneshot::channel();
            let channel = receiver.shared();
            let evicted = current_computations.insert(key.clone(), channel.clone());
            debug_assert!(evicted.is_none());
            metric!(gauge("dedup.in_flight") = current_computations.len() as u64);
            (sender, channel)
        };

        // Observers run as part of this, and they may very well call back into us. The map lock
        // is released by now, and the channel is in place for them to join.
        let resolved = self.store.locked(|| {
            let previous = self
                .store
                .mark_loading(&key, &[Status::Idle, Status::Loading, Status::Error]);
            let value = Arc::clone(previous?.value()?);

            // Another fetch resolved since the caller looked at the entry.
            let mut current_computations = self.current_computations.lock();
            current_computations.remove(&key);
            metric!(gauge("dedup.in_flight") = current_computations.len() as u64);
            Some(value)
        });

        if let Some(value) = resolved {
            tracing::trace!(key = %key, "Entry resolved concurrently, not fetching");
            let result = Ok(value);
            sender.send(result.clone()).ok();
            return FetchHandle::ready(key, result);
        }

        tracing::trace!(key = %key, "Spawning deduplicated fetch");
        self.spawn_computation(key.clone(), executor, sender);

        FetchHandle::from_channel(key, channel)
    }

    /// Joins the in-flight fetch of `key`, without ever starting one.
    pub fn join(&self, key: &RequestKey) -> Option<FetchHandle<T>> {
        let current_computations = self.current_computations.lock();
        let channel = current_computations.get(key)?.clone();
        metric!(counter("dedup.channel.hit") += 1, "resource" => key.resource());
        Some(FetchHandle::from_channel(key.clone(), channel))
    }

    /// Whether a fetch of `key` is currently running.
    pub fn in_flight(&self, key: &RequestKey) -> bool {
        self.current_computations.lock().contains_key(key)
    }

    /// The number of currently running fetches.
    pub fn in_flight_count(&self) -> usize {
        self.current_computations.lock().len()
    }

    fn spawn_computation(
        &self,
        key: RequestKey,
        executor: Executor<T>,
        sender: oneshot::Sender<FetchResult<T>>,
    ) {
        let store = self.store.clone();
        let retry = self.retry;

        let remove_computation_token = {
            let current_computations = Arc::clone(&self.current_computations);
            let key = key.clone();
            CallOnDrop::new(move || {
                let mut current_computations = current_computations.lock();
                current_computations.remove(&key);
                metric!(gauge("dedup.in_flight") = current_computations.len() as u64);
            })
        };

        let computation = async move {
            let result = run_executor(&key, &executor, retry).await;

            // Drop the token only once the entry is resolved, and before anyone else can see the
            // store. Callers either get a channel that will receive data, or they find the
            // resolved entry.
            store.locked(|| {
                store.put(key.clone(), CacheEntry::from_result(key, result.clone()));
                drop(remove_computation_token);
            });
            sender.send(result).ok();
        }
        .bind_hub(Hub::new_from_top(Hub::current()));

        tokio::spawn(computation);
    }
}

/// Invokes `executor`, retrying failures according to `retry`.
///
/// A panicking executor counts as a failed attempt.
async fn run_executor<T>(
    key: &RequestKey,
    executor: &Executor<T>,
    retry: RetryPolicy,
) -> FetchResult<T> {
    let resource = key.resource();
    let mut attempt = 0;

    loop {
        metric!(counter("fetch.executor") += 1, "resource" => resource);
        let start = Instant::now();

        let outcome = AssertUnwindSafe(async { executor().await })
            .catch_unwind()
            .await;
        metric!(timer("fetch.duration") = start.elapsed(), "resource" => resource);

        let result = outcome.unwrap_or_else(|_| {
            tracing::error!(key = %key, "Fetch executor panicked");
            Err(ErrorInfo::unknown("fetch executor panicked"))
        });

        match result {
            Ok(value) => {
                tracing::debug!(key = %key, "Fetch succeeded");
                metric!(counter("fetch.result") += 1, "resource" => resource, "status" => "success");
                return Ok(Arc::new(value));
            }
            Err(error) if attempt < retry.max_retries => {
                attempt += 1;
                tracing::debug!(key = %key, attempt, error = %error, "Retrying failed fetch");
                metric!(counter("fetch.retry") += 1, "resource" => resource);
                tokio::time::sleep(retry.delay).await;
            }
            Err(error) => {
                tracing::debug!(key = %key, error = %error, "Fetch failed");
                metric!(
                    counter("fetch.result") += 1,
                    "resource" => resource,
                    "status" => error.kind.as_str(),
                );
                return Err(error);
            }
        }
    }
}

/// Resolves with the outcome of a deduplicated fetch.
///
/// Dropping the handle does not cancel the fetch.
pub struct FetchHandle<T> {
    key: RequestKey,
    inner: BoxFuture<'static, FetchResult<T>>,
}

impl<T: Send + Sync + 'static> FetchHandle<T> {
    fn from_channel(key: RequestKey, channel: ComputationChannel<T>) -> Self {
        let resource = key.resource().to_owned();
        let inner = channel
            .unwrap_or_else(move |_cancelled_error| {
                Err(ErrorInfo::unknown(format!("{resource} fetch channel dropped")))
            })
            .boxed();
        Self { key, inner }
    }

    /// A handle that resolves immediately.
    pub fn ready(key: RequestKey, result: FetchResult<T>) -> Self {
        Self {
            key,
            inner: future::ready(result).boxed(),
        }
    }
}

impl<T> FetchHandle<T> {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }
}

impl<T> Future for FetchHandle<T> {
    type Output = FetchResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().inner.poll_unpin(cx)
    }
}

impl<T> fmt::Debug for FetchHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
