//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ParkingSpot;
use crate::geo::Coordinates;
use crate::search::EnrichedSpot;
use crate::zones::ZoneRecord;

/// Query for the spot listing.
#[derive(Debug, Default, Deserialize)]
pub struct SpotsQuery {
    /// "Available" or "Occupied", any case
    pub status: Option<String>,

    pub lat: Option<f64>,
    pub lng: Option<f64>,

    /// Kilometres; only used with `lat` and `lng`
    pub radius: Option<f64>,

    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Result of a manual refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub updated: bool,
    pub total: usize,
}

/// Text search over cached spots.
#[derive(Debug, Deserialize)]
pub struct TextSearchQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TextSearchResponse {
    pub spots: Vec<ParkingSpot>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct RatesResponse {
    pub zones: Vec<ZoneRecord>,
    pub count: usize,
}

/// Search for enriched spots around a location.
#[derive(Debug, Deserialize)]
pub struct AreaSearchRequest {
    /// Place name or "lat,lng"
    pub location: String,

    /// Metres
    pub radius: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AreaSearchResponse {
    pub location: Coordinates,
    pub radius_m: f64,
    pub spots: Vec<EnrichedSpot>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub location: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub location: Coordinates,
    pub recommendations: Vec<EnrichedSpot>,
}

/// Cost calculation request.
#[derive(Debug, Deserialize)]
pub struct CostRequest {
    /// Zone id as a string or number
    pub zone_id: Value,

    /// Hours
    pub duration: f64,
}

impl CostRequest {
    /// The zone id in the string form used by the zone reference data.
    pub fn zone_key(&self) -> Option<String> {
        match &self.zone_id {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => n.as_u64().map(|n| n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub zones: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_request_accepts_string_or_number_zone() {
        let req: CostRequest =
            serde_json::from_str(r#"{"zone_id": "7551", "duration": 2}"#).unwrap();
        assert_eq!(req.zone_key().as_deref(), Some("7551"));
        assert_eq!(req.duration, 2.0);

        let req: CostRequest = serde_json::from_str(r#"{"zone_id": 7551, "duration": 1.5}"#).unwrap();
        assert_eq!(req.zone_key().as_deref(), Some("7551"));

        let req: CostRequest = serde_json::from_str(r#"{"zone_id": " ", "duration": 1}"#).unwrap();
        assert!(req.zone_key().is_none());

        let req: CostRequest = serde_json::from_str(r#"{"zone_id": 1.5, "duration": 1}"#).unwrap();
        assert!(req.zone_key().is_none());
    }
}
