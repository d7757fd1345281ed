use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use super::subscriptions::{Subscribers, SubscriptionId, Unsubscribe, notify};
use super::{CacheEntry, Observer, RequestKey, Status, Subscription};

struct StoreState<T> {
    entries: HashMap<RequestKey, CacheEntry<T>>,
    subscribers: Subscribers<T>,
}

/// The lock is reentrant so that observers, which are called while it is held, can read and
/// write the store. The `RefCell` is never borrowed while an observer runs.
struct StoreShared<T> {
    state: ReentrantMutex<RefCell<StoreState<T>>>,
}

impl<T: Send + Sync + 'static> Unsubscribe for StoreShared<T> {
    fn unsubscribe(&self, key: &RequestKey, id: SubscriptionId) {
        let guard = self.state.lock();
        let removed = guard.borrow_mut().subscribers.remove(key, id);
        if removed {
            tracing::trace!(key = %key, "Removed observer");
        }
    }
}

/// The authoritative mapping from [`RequestKey`] to [`CacheEntry`].
///
/// Every mutation notifies the observers of the mutated key, after the mutation is applied and
/// before any other thread can observe or mutate the store. Entries are never dropped on their
/// own, memory grows with the number of distinct keys.
pub struct CacheStore<T> {
    shared: Arc<StoreShared<T>>,
}

impl<T> Clone for CacheStore<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> Default for CacheStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for CacheStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> CacheStore<T> {
    pub fn new() -> Self {
        let state = StoreState {
            entries: HashMap::new(),
            subscribers: Subscribers::default(),
        };
        Self {
            shared: Arc::new(StoreShared {
                state: ReentrantMutex::new(RefCell::new(state)),
            }),
        }
    }

    /// Looks up the entry of `key`.
    pub fn get(&self, key: &RequestKey) -> Option<CacheEntry<T>> {
        let guard = self.shared.state.lock();
        let state = guard.borrow();
        state.entries.get(key).cloned()
    }

    /// Overwrites the entry of `key` and notifies its observers.
    pub fn put(&self, key: RequestKey, entry: CacheEntry<T>) {
        debug_assert_eq!(&key, entry.key(), "entry stored under a foreign key");
        tracing::trace!(key = %key, status = %entry.status(), "Storing entry");

        let stored_key = key.clone();
        self.mutate(&key, move |entries| {
            entries.insert(stored_key, entry.clone());
            Some(entry)
        });
    }

    /// Resets the entry of `key` to [`Status::Idle`], dropping its value or error.
    ///
    /// Does nothing if `key` has no entry.
    pub fn invalidate(&self, key: &RequestKey) {
        self.mutate(key, |entries| {
            let entry = entries.get_mut(key)?;
            tracing::trace!(key = %key, status = %entry.status(), "Invalidating entry");
            *entry = CacheEntry::idle(key.clone());
            Some(entry.clone())
        });
    }

    /// Removes the entry of `key` altogether.
    ///
    /// Observers stay registered and receive an idle snapshot. Does nothing if `key` has no entry.
    pub fn evict(&self, key: &RequestKey) {
        self.mutate(key, |entries| {
            let evicted = entries.remove(key)?;
            tracing::trace!(key = %key, status = %evicted.status(), "Evicted entry");
            Some(CacheEntry::idle(key.clone()))
        });
    }

    /// Registers `observer` for `key`.
    ///
    /// The observer is called right away with the current entry, or an idle snapshot if there is
    /// none, and then synchronously after every `put`, `invalidate` and `evict` of `key`.
    pub fn subscribe<F>(&self, key: RequestKey, observer: F) -> Subscription
    where
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        let observer: Observer<T> = Arc::new(observer);

        let guard = self.shared.state.lock();
        let (id, snapshot) = {
            let mut state = guard.borrow_mut();
            let id = state.subscribers.insert(key.clone(), Arc::clone(&observer));
            let snapshot = state
                .entries
                .get(&key)
                .cloned()
                .unwrap_or_else(|| CacheEntry::idle(key.clone()));
            (id, snapshot)
        };
        observer(&snapshot);
        drop(guard);

        let shared = Arc::clone(&self.shared);
        let registry: Arc<dyn Unsubscribe> = shared;
        Subscription::new(key, id, Arc::downgrade(&registry))
    }

    /// The number of observers registered for `key`.
    pub fn subscriber_count(&self, key: &RequestKey) -> usize {
        let guard = self.shared.state.lock();
        let state = guard.borrow();
        state.subscribers.count(key)
    }

    /// The status of `key`, [`Status::Idle`] if there is no entry.
    pub fn status(&self, key: &RequestKey) -> Status {
        let guard = self.shared.state.lock();
        let state = guard.borrow();
        state
            .entries
            .get(key)
            .map_or(Status::Idle, CacheEntry::status)
    }

    pub fn len(&self) -> usize {
        let guard = self.shared.state.lock();
        let state = guard.borrow();
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` while holding the store lock.
    ///
    /// `f` may use the store, but no other thread can observe or mutate it until `f` returns.
    pub(crate) fn locked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.shared.state.lock();
        f()
    }

    /// Marks `key` as loading if its current status is one of `from`.
    ///
    /// A missing entry counts as [`Status::Idle`]. The check and the write happen atomically,
    /// observers are only notified if the entry changed. Returns the entry as it was before.
    pub(crate) fn mark_loading(&self, key: &RequestKey, from: &[Status]) -> Option<CacheEntry<T>> {
        let mut previous = None;
        self.mutate(key, |entries| {
            previous = entries.get(key).cloned();
            let status = previous.as_ref().map_or(Status::Idle, CacheEntry::status);
            if !from.contains(&status) {
                return None;
            }
            tracing::trace!(key = %key, %status, "Marking entry as loading");
            let loading = CacheEntry::loading(key.clone());
            entries.insert(key.clone(), loading.clone());
            Some(loading)
        });
        previous
    }

    /// Applies `f` to the entries and notifies the observers of `key` with the returned snapshot.
    ///
    /// Observers run while the lock is held, so nobody sees the store in another state meanwhile.
    fn mutate<F>(&self, key: &RequestKey, f: F)
    where
        F: FnOnce(&mut HashMap<RequestKey, CacheEntry<T>>) -> Option<CacheEntry<T>>,
    {
        let guard = self.shared.state.lock();
        let notification = {
            let mut state = guard.borrow_mut();
            let state = &mut *state;
            f(&mut state.entries).map(|snapshot| (state.subscribers.observers(key), snapshot))
        };

        if let Some((observers, snapshot)) = notification {
            notify(&observers, &snapshot);
        }
    }
}
