//! # Fetch caching infrastructure
//!
//! This module holds everything that keeps track of remote resources once they were requested:
//! the [`CacheStore`], the [`Deduplicator`] that coalesces concurrent fetches, the observer
//! registry, and the [`ErrorInfo`] type every failed fetch is reported with.
//!
//! ## Entries
//!
//! Every [`RequestKey`] that was ever fetched has exactly one [`CacheEntry`] in the store, which
//! moves through the following states:
//!
//! - [`Status::Idle`]: nothing fetched yet, or the entry was invalidated.
//! - [`Status::Loading`]: a fetch is in flight.
//! - [`Status::Success`]: the value of the last fetch, shared as an `Arc`.
//! - [`Status::Error`]: the error of the last fetch.
//!
//! Entries never expire. A refetch overwrites the entry in place, and only an explicit
//! [`CacheStore::invalidate`] or [`CacheStore::evict`] gets rid of a value.
//!
//! ## Request coalescing
//!
//! A fetch goes through the following steps:
//! - If a fetch of the same key is already running, the caller joins it and gets its result.
//! - Otherwise, the entry is marked as loading and the executor is spawned onto the runtime.
//! - Once the executor resolves, its result is written to the store, the in-flight marker is
//!   removed, and everyone waiting on the fetch gets the same result.
//!
//! ## Observers
//!
//! Observers are registered per key through [`CacheStore::subscribe`]. They receive the current
//! entry right away, and then every new state of that key, synchronously as part of the
//! mutation. While observers run, no other thread can touch the store, so a lookup from within an
//! observer always matches the entry being delivered.
//!
//! ### Metrics
//!
//! Each of these is tagged with the `resource` of the key:
//!
//! - `dedup.channel.hit`: Fetches that joined an already running fetch.
//! - `dedup.channel.miss`: Fetches that actually started.
//! - `fetch.executor`: Executor invocations, including retries.
//! - `fetch.retry`: Retried executor invocations.
//! - `fetch.result`: Resolved fetches, tagged with the `status`.
//! - `fetch.duration`: The time spent in a single executor invocation.
//!
//! `dedup.in_flight` is a gauge of all running fetches, without a `resource` tag.

mod cache_error;
mod cache_key;
mod dedup;
mod entry;
mod store;
mod subscriptions;

pub use cache_error::{ErrorInfo, ErrorKind};
pub use cache_key::{RequestKey, RequestKeyBuilder};
pub use dedup::{Deduplicator, Executor, FetchHandle};
pub use entry::{CacheEntry, FetchResult, Status};
pub use store::CacheStore;
pub use subscriptions::{Observer, Subscription, SubscriptionId};
