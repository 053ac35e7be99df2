use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use parking_server::cache::{SpotCache, spawn_periodic_refresh};
use parking_server::config::{INITIAL_REFRESH_DELAY, ServerConfig};
use parking_server::geocode::{CoordinateGeocoder, Geocoder, MapboxConfig, MapboxGeocoder};
use parking_server::search::SearchConfig;
use parking_server::upstream::{HttpSpotSource, MockSpotSource, SpotSource};
use parking_server::web::{AppState, create_router};
use parking_server::zones::{FileZoneSource, ZoneReferenceStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServerConfig::from_env()?;

    // Zone reference data is required; fail fast if unavailable
    let zone_source = Arc::new(FileZoneSource::new(&config.zone_data_path));
    let zones = ZoneReferenceStore::load(zone_source).map_err(|e| {
        error!(error = %e, path = %config.zone_data_path.display(), "failed to load zone data");
        e
    })?;

    // Upstream: payloads from disk in mock mode, otherwise the live feed
    let (source, endpoints): (Arc<dyn SpotSource>, Vec<String>) = match &config.mock_dir {
        Some(dir) => {
            let (mock, urls) = MockSpotSource::from_dir(dir)?;
            info!(dir = %dir.display(), payloads = urls.len(), "using mock upstream");
            (Arc::new(mock) as Arc<dyn SpotSource>, urls)
        }
        None => {
            let http = HttpSpotSource::new(&config.upstream)?;
            (
                Arc::new(http) as Arc<dyn SpotSource>,
                config.upstream.endpoints.clone(),
            )
        }
    };

    let cache = Arc::new(SpotCache::new(source, endpoints, config.cache.clone()));
    spawn_periodic_refresh(cache.clone(), INITIAL_REFRESH_DELAY, config.refresh_interval);

    let geocoder: Arc<dyn Geocoder> = match &config.mapbox_token {
        Some(token) => Arc::new(MapboxGeocoder::new(MapboxConfig::new(token))?),
        None => {
            warn!("MAPBOX_ACCESS_TOKEN not set; only \"lat,lng\" locations will resolve");
            Arc::new(CoordinateGeocoder)
        }
    };

    let state = AppState::new(cache, zones, SearchConfig::default(), geocoder)
        .with_rate_limit(config.rate_limit.clone());
    let app = create_router(state);

    info!(
        addr = %config.bind_addr,
        ttl_secs = config.cache.ttl.as_secs(),
        refresh_secs = config.refresh_interval.as_secs(),
        rate_limit = config.rate_limit.max_requests,
        "parking server listening"
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
