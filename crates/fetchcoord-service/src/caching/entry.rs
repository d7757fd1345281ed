use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use super::{ErrorInfo, RequestKey};

/// The result of a fetch operation, shared by everyone who awaited it.
pub type FetchResult<T> = Result<Arc<T>, ErrorInfo>;

/// The state of a [`CacheEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Nothing was fetched yet, or the entry was invalidated.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last fetch resolved with a value.
    Success,
    /// The last fetch failed.
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Loading => "loading",
            Status::Success => "success",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq)]
enum State<T> {
    Idle,
    Loading,
    Success(Arc<T>),
    Error(ErrorInfo),
}

/// The cached state of one [`RequestKey`].
///
/// A value is present iff the status is [`Status::Success`], an error is present iff the status
/// is [`Status::Error`]. The constructors are the only way to create an entry, which upholds this.
pub struct CacheEntry<T> {
    key: RequestKey,
    state: State<T>,
    fetched_at: Option<SystemTime>,
}

impl<T> CacheEntry<T> {
    pub fn idle(key: RequestKey) -> Self {
        Self {
            key,
            state: State::Idle,
            fetched_at: None,
        }
    }

    pub fn loading(key: RequestKey) -> Self {
        Self {
            key,
            state: State::Loading,
            fetched_at: None,
        }
    }

    pub fn success(key: RequestKey, value: Arc<T>) -> Self {
        Self {
            key,
            state: State::Success(value),
            fetched_at: Some(SystemTime::now()),
        }
    }

    pub fn failed(key: RequestKey, error: ErrorInfo) -> Self {
        Self {
            key,
            state: State::Error(error),
            fetched_at: Some(SystemTime::now()),
        }
    }

    /// Creates a resolved entry from the outcome of a fetch.
    pub fn from_result(key: RequestKey, result: FetchResult<T>) -> Self {
        match result {
            Ok(value) => Self::success(key, value),
            Err(error) => Self::failed(key, error),
        }
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn status(&self) -> Status {
        match self.state {
            State::Idle => Status::Idle,
            State::Loading => Status::Loading,
            State::Success(_) => Status::Success,
            State::Error(_) => Status::Error,
        }
    }

    pub fn value(&self) -> Option<&Arc<T>> {
        match &self.state {
            State::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match &self.state {
            State::Error(error) => Some(error),
            _ => None,
        }
    }

    /// When the fetch that produced this entry resolved.
    ///
    /// Only set for [`Status::Success`] and [`Status::Error`].
    pub fn fetched_at(&self) -> Option<SystemTime> {
        self.fetched_at
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, State::Loading)
    }

    /// Returns the resolved outcome, or `None` while idle or loading.
    pub fn result(&self) -> Option<FetchResult<T>> {
        match &self.state {
            State::Success(value) => Some(Ok(Arc::clone(value))),
            State::Error(error) => Some(Err(error.clone())),
            State::Idle | State::Loading => None,
        }
    }
}

// `derive(Clone)` would require `T: Clone`, but values are shared through the `Arc`.
impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        let state = match &self.state {
            State::Idle => State::Idle,
            State::Loading => State::Loading,
            State::Success(value) => State::Success(Arc::clone(value)),
            State::Error(error) => State::Error(error.clone()),
        };
        Self {
            key: self.key.clone(),
            state,
            fetched_at: self.fetched_at,
        }
    }
}

impl<T: PartialEq> PartialEq for CacheEntry<T> {
    /// Compares key, status and contents, but not the resolution time.
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.state == other.state
    }
}

impl<T: fmt::Debug> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}
