//! A typed fetch, cache and notify coordinator.
//!
//! The [`FetchCoordinator`](coordinator::FetchCoordinator) issues keyed remote fetches through
//! caller-supplied executors, caches their results per [`RequestKey`](caching::RequestKey),
//! coalesces concurrent fetches of the same key and fans state changes out to any number of
//! observers. See the [`caching`] module for how the pieces fit together.

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod coordinator;
pub mod logging;
pub mod utils;
