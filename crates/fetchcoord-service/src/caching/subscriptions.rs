use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use super::{CacheEntry, RequestKey};

/// A callback that receives every state of a [`RequestKey`] it is subscribed to.
pub type Observer<T> = Arc<dyn Fn(&CacheEntry<T>) + Send + Sync>;

/// Identifies one registration of an [`Observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// The observers registered per key, in subscription order.
pub(crate) struct Subscribers<T> {
    next_id: u64,
    by_key: HashMap<RequestKey, Vec<(SubscriptionId, Observer<T>)>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            by_key: HashMap::new(),
        }
    }
}

impl<T> Subscribers<T> {
    pub(crate) fn insert(&mut self, key: RequestKey, observer: Observer<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.by_key.entry(key).or_default().push((id, observer));
        id
    }

    /// Removes a registration, returning whether it was still present.
    pub(crate) fn remove(&mut self, key: &RequestKey, id: SubscriptionId) -> bool {
        let Some(observers) = self.by_key.get_mut(key) else {
            return false;
        };
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        let removed = observers.len() != before;

        if observers.is_empty() {
            self.by_key.remove(key);
        }
        removed
    }

    /// Returns the observers of `key`, in subscription order.
    ///
    /// This is a snapshot, so observers may (un)subscribe while being notified.
    pub(crate) fn observers(&self, key: &RequestKey) -> Vec<Observer<T>> {
        self.by_key
            .get(key)
            .map(|observers| {
                observers
                    .iter()
                    .map(|(_, observer)| Arc::clone(observer))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, key: &RequestKey) -> usize {
        self.by_key.get(key).map_or(0, Vec::len)
    }
}

pub(crate) fn notify<T>(observers: &[Observer<T>], entry: &CacheEntry<T>) {
    for observer in observers {
        observer(entry);
    }
}

/// Something an observer can be removed from.
pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, key: &RequestKey, id: SubscriptionId);
}

/// The handle of a registered observer.
///
/// Dropping the handle does *not* remove the observer, call [`unsubscribe`](Self::unsubscribe)
/// for that. The handle only weakly references its store.
pub struct Subscription {
    key: RequestKey,
    id: SubscriptionId,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub(crate) fn new(key: RequestKey, id: SubscriptionId, registry: Weak<dyn Unsubscribe>) -> Self {
        Self { key, id, registry }
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stops notifying the observer.
    ///
    /// Calling this more than once, or after the store was dropped, does nothing.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(&self.key, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
