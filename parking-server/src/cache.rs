//! Time-bounded cache of live parking spots.
//!
//! Holds the last good snapshot from the upstream feed. A snapshot younger
//! than the TTL is served as-is; an older (or missing) one triggers a
//! refresh that walks the configured endpoints in order. When every
//! endpoint fails the previous snapshot is served with a warning, so
//! transient upstream outages are invisible to callers once the cache has
//! been filled at least once.
//!
//! Overlapping refreshes (request-driven and timer-driven) are coalesced
//! onto one in-flight fetch through a moka cache keyed by `REFRESH_KEY`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::{ParkingError, ParkingSpot, SpotStatus};
use crate::geo::Coordinates;
use crate::upstream::{FetchError, SpotSource, normalize};

/// Attached to responses served from a stale snapshot.
pub const STALE_WARNING: &str = "Using cached data, may not be the latest";

/// Single key for the in-flight refresh registry.
const REFRESH_KEY: &str = "spots";

/// Configuration for the spot cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a snapshot is served without refreshing.
    pub ttl: Duration,

    /// Upper bound on a single endpoint attempt.
    pub attempt_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

/// One complete, immutable result of a successful refresh.
#[derive(Debug)]
pub struct CacheSnapshot {
    pub spots: Vec<ParkingSpot>,
    pub captured_at: DateTime<Utc>,
    pub endpoint: String,
    captured: Instant,
}

impl CacheSnapshot {
    fn new(spots: Vec<ParkingSpot>, endpoint: &str) -> Self {
        Self {
            spots,
            captured_at: Utc::now(),
            endpoint: endpoint.to_string(),
            captured: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.captured.elapsed()
    }
}

/// Keep spots within `radius_km` of `center`.
#[derive(Debug, Clone, Copy)]
pub struct GeoFilter {
    pub center: Coordinates,
    pub radius_km: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SpotFilters {
    /// Case-insensitive exact status match ("available", "Occupied", ...)
    pub status: Option<String>,
    pub near: Option<GeoFilter>,
}

/// A snapshot as handed to a caller, with how it was obtained.
#[derive(Debug, Clone)]
pub struct Served {
    pub snapshot: Arc<CacheSnapshot>,
    /// True when no refresh happened for this request
    pub cached: bool,
    pub warning: Option<&'static str>,
}

/// One page of filtered spots.
#[derive(Debug, Clone, Serialize)]
pub struct SpotPage {
    pub spots: Vec<ParkingSpot>,
    /// Number of spots matching the filters, before pagination
    pub total: usize,
    pub cached: bool,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotStats {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
    /// Percentage of available spots, one decimal place
    pub availability_rate: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub spots: usize,
    pub fresh: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub endpoint: Option<String>,
    pub ttl_secs: u64,
}

/// Why a single endpoint attempt produced nothing.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Format(#[from] ParkingError),

    #[error("response contained no usable spots")]
    Empty,
}

/// The live spot cache.
///
/// Constructed once and shared as `Arc<SpotCache>`.
pub struct SpotCache {
    source: Arc<dyn SpotSource>,
    endpoints: Vec<String>,
    config: CacheConfig,
    snapshot: RwLock<Option<Arc<CacheSnapshot>>>,
    inflight: MokaCache<&'static str, Arc<CacheSnapshot>>,
}

impl SpotCache {
    pub fn new(source: Arc<dyn SpotSource>, endpoints: Vec<String>, config: CacheConfig) -> Self {
        Self {
            source,
            endpoints,
            config,
            snapshot: RwLock::new(None),
            inflight: MokaCache::builder().max_capacity(1).build(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The current snapshot, if any, without refreshing.
    pub async fn current(&self) -> Option<Arc<CacheSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Serve the full snapshot, refreshing first if it is stale or absent.
    ///
    /// A failed refresh falls back to the previous snapshot with a
    /// warning. Fails only when no refresh has ever succeeded.
    pub async fn serve(&self) -> Result<Served, ParkingError> {
        if let Some(snapshot) = self.current().await
            && snapshot.age() < self.config.ttl
        {
            return Ok(Served {
                snapshot,
                cached: true,
                warning: None,
            });
        }

        match self.refresh_snapshot().await {
            Ok(snapshot) => Ok(Served {
                snapshot,
                cached: false,
                warning: None,
            }),
            Err(err) => match self.current().await {
                Some(snapshot) => {
                    warn!(
                        error = %err,
                        age_secs = snapshot.age().as_secs(),
                        "refresh failed, serving stale spot data"
                    );
                    Ok(Served {
                        snapshot,
                        cached: true,
                        warning: Some(STALE_WARNING),
                    })
                }
                None => Err(err),
            },
        }
    }

    /// Filtered, paginated spots.
    pub async fn get(
        &self,
        filters: &SpotFilters,
        limit: usize,
        offset: usize,
    ) -> Result<SpotPage, ParkingError> {
        let served = self.serve().await?;
        let matching = apply_filters(&served.snapshot.spots, filters);
        let total = matching.len();
        let spots = matching.into_iter().skip(offset).take(limit).collect();

        Ok(SpotPage {
            spots,
            total,
            cached: served.cached,
            last_updated: served.snapshot.captured_at,
            warning: served.warning.map(str::to_string),
        })
    }

    /// Refresh from upstream now, regardless of age.
    ///
    /// Returns the number of spots in the new snapshot.
    pub async fn refresh(&self) -> Result<usize, ParkingError> {
        self.refresh_snapshot().await.map(|s| s.spots.len())
    }

    async fn refresh_snapshot(&self) -> Result<Arc<CacheSnapshot>, ParkingError> {
        let result = self
            .inflight
            .try_get_with(REFRESH_KEY, self.fetch_and_install())
            .await;

        // Clear the slot so the next refresh goes upstream again
        self.inflight.invalidate(&REFRESH_KEY).await;

        result.map_err(|e| (*e).clone())
    }

    /// Walk the endpoints in order; install the first non-empty result.
    async fn fetch_and_install(&self) -> Result<Arc<CacheSnapshot>, ParkingError> {
        for (index, url) in self.endpoints.iter().enumerate() {
            match self.attempt(url).await {
                Ok(spots) => {
                    let snapshot = Arc::new(CacheSnapshot::new(spots, url));
                    *self.snapshot.write().await = Some(snapshot.clone());

                    info!(
                        endpoint = %url,
                        spots = snapshot.spots.len(),
                        "refreshed parking spots"
                    );
                    return Ok(snapshot);
                }
                Err(err) => {
                    warn!(
                        endpoint = %url,
                        attempt = index + 1,
                        error = %err,
                        "upstream endpoint failed"
                    );
                }
            }
        }

        Err(ParkingError::AllEndpointsFailed {
            attempts: self.endpoints.len(),
        })
    }

    async fn attempt(&self, url: &str) -> Result<Vec<ParkingSpot>, AttemptError> {
        let timeout = self.config.attempt_timeout;
        let payload = tokio::time::timeout(timeout, self.source.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout {
                secs: timeout.as_secs(),
            })??;

        let normalized = normalize(&payload)?;
        if normalized.spots.is_empty() {
            return Err(AttemptError::Empty);
        }
        Ok(normalized.spots)
    }

    /// Occupancy counts over the current snapshot. Never refreshes.
    pub async fn stats(&self) -> SpotStats {
        let Some(snapshot) = self.current().await else {
            return SpotStats {
                total: 0,
                available: 0,
                occupied: 0,
                availability_rate: 0.0,
                last_updated: None,
            };
        };

        let total = snapshot.spots.len();
        let available = snapshot
            .spots
            .iter()
            .filter(|s| s.status == SpotStatus::Available)
            .count();
        let availability_rate = if total == 0 {
            0.0
        } else {
            (available as f64 / total as f64 * 1000.0).round() / 10.0
        };

        SpotStats {
            total,
            available,
            occupied: total - available,
            availability_rate,
            last_updated: Some(snapshot.captured_at),
        }
    }

    /// Case-insensitive substring search on name, street and area.
    pub async fn find_by_text(&self, query: &str, limit: usize) -> Vec<ParkingSpot> {
        let Some(snapshot) = self.current().await else {
            return Vec::new();
        };

        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        snapshot
            .spots
            .iter()
            .filter(|s| s.matches_text(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Look up a spot by any of its identifiers.
    pub async fn find_by_id(&self, id: &str) -> Option<ParkingSpot> {
        let snapshot = self.current().await?;
        snapshot.spots.iter().find(|s| s.has_id(id)).cloned()
    }

    pub async fn status(&self) -> CacheStatus {
        let snapshot = self.current().await;
        CacheStatus {
            spots: snapshot.as_ref().map_or(0, |s| s.spots.len()),
            fresh: snapshot
                .as_ref()
                .is_some_and(|s| s.age() < self.config.ttl),
            last_updated: snapshot.as_ref().map(|s| s.captured_at),
            age_secs: snapshot.as_ref().map(|s| s.age().as_secs()),
            endpoint: snapshot.as_ref().map(|s| s.endpoint.clone()),
            ttl_secs: self.config.ttl.as_secs(),
        }
    }
}

/// Apply status and distance filters, preserving order.
pub fn apply_filters(spots: &[ParkingSpot], filters: &SpotFilters) -> Vec<ParkingSpot> {
    spots
        .iter()
        .filter(|s| {
            filters
                .status
                .as_deref()
                .is_none_or(|status| s.status.matches(status))
        })
        .filter(|s| {
            filters
                .near
                .is_none_or(|near| s.distance_from(&near.center) <= near.radius_km)
        })
        .cloned()
        .collect()
}

/// Refresh the cache in the background: once after `initial_delay`, then
/// every `interval`. Failures are logged and retried on the next tick.
pub fn spawn_periodic_refresh(
    cache: Arc<SpotCache>,
    initial_delay: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(initial_delay).await;

        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match cache.refresh().await {
                Ok(count) => info!(spots = count, "periodic refresh complete"),
                Err(e) => warn!(error = %e, "periodic refresh failed"),
            }
        }
    })
}
