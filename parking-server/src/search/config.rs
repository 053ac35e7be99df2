//! Search configuration.

/// Configuration parameters for spot search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Radius used when a search request gives none (km).
    pub search_radius_km: f64,

    /// Radius searched when building recommendations (km).
    pub recommend_radius_km: f64,

    /// Number of recommendations returned when a request gives no limit.
    pub recommend_limit: usize,

    /// Number of entries in each sample list of the match report.
    pub match_sample: usize,
}

impl SearchConfig {
    pub fn with_search_radius(mut self, km: f64) -> Self {
        self.search_radius_km = km;
        self
    }

    pub fn with_recommend_radius(mut self, km: f64) -> Self {
        self.recommend_radius_km = km;
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_radius_km: 0.3,
            recommend_radius_km: 0.3,
            recommend_limit: 5,
            match_sample: 10,
        }
    }
}
