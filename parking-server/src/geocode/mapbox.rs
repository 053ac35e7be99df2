//! Mapbox forward geocoding, restricted to greater Melbourne.

use std::time::Duration;

use futures::future::BoxFuture;
use moka::future::Cache as MokaCache;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::geo::Coordinates;

use super::{GeocodeError, Geocoder};

const DEFAULT_BASE_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

/// Bounding box (min lon, min lat, max lon, max lat) around Melbourne.
const MELBOURNE_BBOX: &str = "144.5,-38.5,145.5,-37.5";

const COUNTRY: &str = "AU";

#[derive(Debug, Clone)]
pub struct MapboxConfig {
    pub access_token: String,
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// How long a resolved place name is remembered
    pub cache_ttl: Duration,
}

impl MapboxConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    /// `[lon, lat]`
    center: [f64; 2],
}

/// Mapbox geocoder with an in-memory result cache.
pub struct MapboxGeocoder {
    http: reqwest::Client,
    config: MapboxConfig,
    cache: MokaCache<String, Coordinates>,
}

impl MapboxGeocoder {
    pub fn new(config: MapboxConfig) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let cache = MokaCache::builder()
            .time_to_live(config.cache_ttl)
            .max_capacity(10_000)
            .build();

        Ok(Self {
            http,
            config,
            cache,
        })
    }

    fn request_url(&self, query: &str) -> Result<Url, GeocodeError> {
        let invalid = || GeocodeError::Api {
            status: 0,
            message: format!("Invalid geocoding base URL: {}", self.config.base_url),
        };

        let mut url = Url::parse(&self.config.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .push(&format!("{query}.json"));
        url.query_pairs_mut()
            .append_pair("access_token", &self.config.access_token)
            .append_pair("bbox", MELBOURNE_BBOX)
            .append_pair("country", COUNTRY)
            .append_pair("limit", "1");
        Ok(url)
    }

    async fn lookup(&self, query: &str) -> Result<Coordinates, GeocodeError> {
        let key = query.to_lowercase();
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let url = self.request_url(query)?;
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let coords = first_center(&body, query)?;

        debug!(query, lat = coords.latitude, lng = coords.longitude, "geocoded location");
        self.cache.insert(key, coords).await;
        Ok(coords)
    }
}

impl Geocoder for MapboxGeocoder {
    fn geocode<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Coordinates, GeocodeError>> {
        Box::pin(self.lookup(query))
    }
}

/// Coordinates of the first feature in a geocoding response.
fn first_center(body: &str, query: &str) -> Result<Coordinates, GeocodeError> {
    let response: GeocodeResponse = serde_json::from_str(body).map_err(|e| GeocodeError::Json {
        message: e.to_string(),
    })?;

    let [lon, lat] = response
        .features
        .first()
        .map(|f| f.center)
        .ok_or_else(|| GeocodeError::NotFound {
            query: query.to_string(),
        })?;

    Ok(Coordinates::new(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = MapboxConfig::new("pk.test");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn request_url_restricts_to_melbourne() {
        let geocoder = MapboxGeocoder::new(MapboxConfig::new("pk.test")).unwrap();
        let url = geocoder.request_url("Flinders Street Station").unwrap();

        assert!(
            url.path()
                .ends_with("/mapbox.places/Flinders%20Street%20Station.json")
        );
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("bbox".into(), MELBOURNE_BBOX.into())));
        assert!(pairs.contains(&("country".into(), "AU".into())));
        assert!(pairs.contains(&("limit".into(), "1".into())));
        assert!(pairs.contains(&("access_token".into(), "pk.test".into())));
    }

    #[test]
    fn first_center_is_lon_lat() {
        let body = r#"{"features": [{"center": [144.9671, -37.8183]}, {"center": [0.0, 0.0]}]}"#;
        let coords = first_center(body, "Flinders Street").unwrap();
        assert_eq!(coords, Coordinates::new(-37.8183, 144.9671));
    }

    #[test]
    fn no_features_is_not_found() {
        let err = first_center(r#"{"features": []}"#, "Nowhere").unwrap_err();
        assert!(matches!(err, GeocodeError::NotFound { query } if query == "Nowhere"));

        let err = first_center("not json", "x").unwrap_err();
        assert!(matches!(err, GeocodeError::Json { .. }));
    }

    #[tokio::test]
    async fn cached_names_skip_the_network() {
        let geocoder = MapboxGeocoder::new(
            MapboxConfig::new("pk.test").with_base_url("http://127.0.0.1:9/unreachable"),
        )
        .unwrap();
        let coords = Coordinates::new(-37.81, 144.96);
        geocoder.cache.insert("southbank".to_string(), coords).await;

        assert_eq!(geocoder.geocode("Southbank").await.unwrap(), coords);
    }
}
