//! Upstream parking sensor feed.
//!
//! The city's open-data portal publishes live bay occupancy from several
//! endpoints, each in its own response shape. This module fetches raw
//! payloads (`SpotSource`) and converts them into canonical spots
//! (`normalize`). Fallback across endpoints lives in the cache.

mod client;
mod error;
mod mock;
mod normalize;

use futures::future::BoxFuture;
use serde_json::Value;

pub use client::{DEFAULT_ENDPOINTS, HttpSpotSource, USER_AGENT, UpstreamConfig};
pub use error::FetchError;
pub use mock::MockSpotSource;
pub use normalize::{Normalized, PayloadShape, normalize};

/// Fetches one raw JSON payload from an endpoint URL.
///
/// Returns a boxed future so the cache can hold an `Arc<dyn SpotSource>`.
pub trait SpotSource: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, FetchError>>;
}
