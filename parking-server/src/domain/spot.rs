//! Canonical parking spot record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

/// Occupancy reported by a bay sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpotStatus {
    Available,
    Occupied,
}

impl SpotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotStatus::Available => "Available",
            SpotStatus::Occupied => "Occupied",
        }
    }

    /// Case-insensitive exact match against a filter value.
    pub fn matches(&self, filter: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(filter)
    }
}

impl fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time restriction attached to a bay by the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restrictions {
    #[serde(rename = "type")]
    pub restriction_type: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub length: Option<String>,
}

impl Default for Restrictions {
    fn default() -> Self {
        Self {
            restriction_type: "No restriction".to_string(),
            start: None,
            end: None,
            length: None,
        }
    }
}

/// Pricing descriptor. The sensor feed carries no prices, so this is
/// always the generic hourly descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    #[serde(rename = "type")]
    pub cost_type: String,
    pub rate: String,
}

impl Default for CostInfo {
    fn default() -> Self {
        Self {
            cost_type: "Hourly".to_string(),
            rate: "Varies by location".to_string(),
        }
    }
}

/// A single on-street parking bay, as held in the cache.
///
/// Latitude and longitude are always finite numbers: records without
/// usable coordinates are dropped during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: String,
    pub external_id: Option<String>,
    pub sensor_id: Option<String>,
    pub bay_id: Option<String>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub street_name: String,
    /// Zone number in the string form used by the zone reference data.
    pub zone_number: Option<String>,
    pub status: SpotStatus,
    pub parking_type: String,
    pub capacity: u32,
    pub restrictions: Restrictions,
    pub cost_info: CostInfo,
    pub last_updated: String,
    pub area: String,
}

impl ParkingSpot {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Distance from a point in kilometres.
    pub fn distance_from(&self, point: &Coordinates) -> f64 {
        point.distance_to(&self.coordinates())
    }

    /// Whether any of this spot's identifiers equals `id`.
    pub fn has_id(&self, id: &str) -> bool {
        self.id == id
            || self.external_id.as_deref() == Some(id)
            || self.sensor_id.as_deref() == Some(id)
            || self.bay_id.as_deref() == Some(id)
    }

    /// Case-insensitive substring match on name, street and area.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self.street_name.to_lowercase().contains(needle_lower)
            || self.area.to_lowercase().contains(needle_lower)
    }
}
