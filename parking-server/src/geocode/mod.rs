//! Free-text location → coordinates.
//!
//! Query locations arrive either as `"lat,lng"` literals or as place
//! names. Literals are parsed locally; names go to a `Geocoder`.

mod mapbox;

use futures::future::BoxFuture;

use crate::geo::Coordinates;

pub use mapbox::{MapboxConfig, MapboxGeocoder};

/// Errors from resolving a location.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("location is empty")]
    EmptyQuery,

    /// No geocoding service configured, and the text is not a coordinate pair
    #[error("geocoding is not configured; pass coordinates as \"lat,lng\"")]
    NotConfigured,

    #[error("no location found for {query:?}")]
    NotFound { query: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {message}")]
    Json { message: String },
}

/// Resolves a place name to coordinates.
pub trait Geocoder: Send + Sync {
    fn geocode<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Coordinates, GeocodeError>>;
}

/// Geocoder used when no service is configured. Only coordinate literals
/// (handled by `resolve_location`) resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateGeocoder;

impl Geocoder for CoordinateGeocoder {
    fn geocode<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, Result<Coordinates, GeocodeError>> {
        Box::pin(async { Err::<Coordinates, _>(GeocodeError::NotConfigured) })
    }
}

/// Resolve user-supplied location text.
///
/// A `"lat,lng"` literal is used directly; anything else is geocoded.
pub async fn resolve_location(
    geocoder: &dyn Geocoder,
    text: &str,
) -> Result<Coordinates, GeocodeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GeocodeError::EmptyQuery);
    }

    if let Ok(coords) = Coordinates::parse_pair(text) {
        return Ok(coords);
    }

    geocoder.geocode(text).await
}
