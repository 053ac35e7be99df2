//! Application state for the web layer.

use std::sync::Arc;

use crate::cache::SpotCache;
use crate::geocode::Geocoder;
use crate::search::{SearchConfig, SearchEngine};
use crate::zones::ZoneReferenceStore;

use super::rate_limit::{RateLimitConfig, RateLimiter};

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Live spot cache
    pub cache: Arc<SpotCache>,

    /// Zone restriction reference data
    pub zones: ZoneReferenceStore,

    /// Search over the cache joined with zone data
    pub search: SearchEngine,

    /// Resolves place names in search requests
    pub geocoder: Arc<dyn Geocoder>,

    /// Per-client limits on the API routes
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(
        cache: Arc<SpotCache>,
        zones: ZoneReferenceStore,
        config: SearchConfig,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        let search = SearchEngine::new(cache.clone(), zones.clone(), config);
        Self {
            cache,
            zones,
            search,
            geocoder,
            limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
        }
    }

    /// Replace the default API rate limit.
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.limiter = Arc::new(RateLimiter::new(config));
        self
    }
}
