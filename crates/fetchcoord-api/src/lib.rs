//! Fetch executors for the sample REST API.
//!
//! The [`ApiClient`] talks to the API and reports failures as
//! [`ErrorInfo`](fetchcoord_service::caching::ErrorInfo), classified by HTTP status. The
//! [`Resources`] bundle holds one coordinator per payload type and builds the descriptors that
//! wire the client calls up as executors.

mod client;
mod error;
mod resources;
pub mod types;

pub use client::{ApiClient, create_client};
pub use error::{status_error, transport_error};
pub use resources::{Resources, keys};
