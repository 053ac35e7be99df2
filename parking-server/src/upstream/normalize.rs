//! Conversion from upstream payloads to canonical parking spots.
//!
//! The open-data portal serves the same sensor data in several shapes
//! depending on the endpoint (records API, JSON export, GeoJSON export,
//! legacy wrapped records). Shapes are tried in a fixed priority order
//! from the `SHAPES` table; adding a new shape means adding one entry.

use chrono::Utc;
use serde_json::{Number, Value};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{CostInfo, ParkingError, ParkingSpot, Restrictions, SpotStatus};
use crate::geo::Coordinates;

const DEFAULT_AREA: &str = "Melbourne CBD";
const DEFAULT_PARKING_TYPE: &str = "On-street";

static NULL: Value = Value::Null;

/// Top-level layout of an upstream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `{"results": [...]}`
    ResultsArray,
    /// GeoJSON `{"features": [...]}`
    FeatureCollection,
    /// `[...]`
    BareArray,
    /// `{"result": {"records": [...]}}`
    WrappedRecords,
}

/// One entry in the shape table: how to find the items, and how to turn
/// one item into a spot.
struct ShapeHandler {
    shape: PayloadShape,
    items: fn(&Value) -> Option<&Vec<Value>>,
    transform: fn(&Value, &str) -> Option<ParkingSpot>,
}

const SHAPES: &[ShapeHandler] = &[
    ShapeHandler {
        shape: PayloadShape::ResultsArray,
        items: results_items,
        transform: record_to_spot,
    },
    ShapeHandler {
        shape: PayloadShape::FeatureCollection,
        items: feature_items,
        transform: feature_to_spot,
    },
    ShapeHandler {
        shape: PayloadShape::BareArray,
        items: Value::as_array,
        transform: record_to_spot,
    },
    ShapeHandler {
        shape: PayloadShape::WrappedRecords,
        items: wrapped_items,
        transform: record_to_spot,
    },
];

fn results_items(payload: &Value) -> Option<&Vec<Value>> {
    payload.get("results")?.as_array()
}

fn feature_items(payload: &Value) -> Option<&Vec<Value>> {
    payload.get("features")?.as_array()
}

fn wrapped_items(payload: &Value) -> Option<&Vec<Value>> {
    payload.get("result")?.get("records")?.as_array()
}

/// Result of normalizing one payload.
#[derive(Debug)]
pub struct Normalized {
    pub shape: PayloadShape,
    pub spots: Vec<ParkingSpot>,
    /// Records dropped for lack of usable coordinates.
    pub dropped: usize,
}

/// Detect the payload shape and convert every usable record.
///
/// Fails with `UnrecognizedFormat` when no shape matches. A recognised
/// payload with zero usable records is not an error here; the caller
/// decides what an empty result means.
pub fn normalize(payload: &Value) -> Result<Normalized, ParkingError> {
    let Some((handler, items)) = SHAPES
        .iter()
        .find_map(|h| (h.items)(payload).map(|items| (h, items)))
    else {
        let keys = payload
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        return Err(ParkingError::UnrecognizedFormat { keys });
    };

    debug!(
        shape = ?handler.shape,
        records = items.len(),
        "detected upstream payload shape"
    );

    let captured_at = Utc::now().to_rfc3339();
    let spots: Vec<ParkingSpot> = items
        .iter()
        .filter_map(|item| (handler.transform)(item, &captured_at))
        .collect();
    let dropped = items.len() - spots.len();

    if dropped > 0 {
        debug!(dropped, kept = spots.len(), "dropped records without coordinates");
    }

    Ok(Normalized {
        shape: handler.shape,
        spots,
        dropped,
    })
}

/// Convert a flat (or `record`-wrapped) item.
fn record_to_spot(item: &Value, captured_at: &str) -> Option<ParkingSpot> {
    let record = unwrap_record(item);
    let coords = record_coordinates(record)?;
    Some(build_spot(record, coords, captured_at))
}

/// Convert a GeoJSON feature. Geometry coordinates are `[lon, lat]`.
fn feature_to_spot(feature: &Value, captured_at: &str) -> Option<ParkingSpot> {
    let props = feature
        .get("properties")
        .filter(|p| p.is_object())
        .unwrap_or(&NULL);
    let coords = feature_coordinates(feature).or_else(|| record_coordinates(props))?;
    Some(build_spot(props, coords, captured_at))
}

/// Records API v2.0 nests fields under `record` (and sometimes `fields`).
fn unwrap_record(item: &Value) -> &Value {
    let record = item
        .get("record")
        .filter(|r| r.is_object())
        .unwrap_or(item);
    record
        .get("fields")
        .filter(|f| f.is_object())
        .unwrap_or(record)
}

fn feature_coordinates(feature: &Value) -> Option<Coordinates> {
    let coords = feature.get("geometry")?.get("coordinates")?.as_array()?;
    if coords.len() < 2 {
        return None;
    }
    Some(Coordinates::new(number(&coords[1])?, number(&coords[0])?))
}

/// Try each coordinate layout in priority order.
fn record_coordinates(record: &Value) -> Option<Coordinates> {
    record
        .get("location")
        .and_then(|loc| coordinate_pair(loc, "lat", "lon"))
        .or_else(|| coordinate_pair(record, "latitude", "longitude"))
        .or_else(|| coordinate_pair(record, "lat", "lon"))
        .or_else(|| geopoint(record))
}

fn coordinate_pair(value: &Value, lat_key: &str, lon_key: &str) -> Option<Coordinates> {
    let lat = number(value.get(lat_key)?)?;
    let lon = number(value.get(lon_key)?)?;
    Some(Coordinates::new(lat, lon))
}

/// `geopoint2d` is `[lat, lon]`, the opposite of GeoJSON.
fn geopoint(record: &Value) -> Option<Coordinates> {
    let point = record.get("geopoint2d")?.as_array()?;
    if point.len() < 2 {
        return None;
    }
    Some(Coordinates::new(number(&point[0])?, number(&point[1])?))
}

/// A finite number from a JSON number or numeric string.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// A non-empty string field; numbers are rendered in integer form when
/// they have no fractional part.
fn text(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(number_to_string(n)),
        _ => None,
    }
}

fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// "Present" under either status field means a car is in the bay.
fn status_of(record: &Value) -> SpotStatus {
    let present = ["status_description", "status"]
        .iter()
        .any(|key| record.get(*key).and_then(Value::as_str) == Some("Present"));

    if present {
        SpotStatus::Occupied
    } else {
        SpotStatus::Available
    }
}

fn restrictions_of(record: &Value) -> Restrictions {
    // GeoJSON exports carry a nested object; flat records use prefixed keys
    if let Some(nested) = record.get("restrictions").filter(|r| r.is_object()) {
        return Restrictions {
            restriction_type: text(nested, "type")
                .unwrap_or_else(|| Restrictions::default().restriction_type),
            start: text(nested, "start"),
            end: text(nested, "end"),
            length: text(nested, "length"),
        };
    }

    Restrictions {
        restriction_type: text(record, "restriction_type")
            .unwrap_or_else(|| Restrictions::default().restriction_type),
        start: text(record, "restriction_start_time"),
        end: text(record, "restriction_end_time"),
        length: text(record, "restriction_length"),
    }
}

fn generated_id() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("spot_{}", &token[..9])
}

fn build_spot(record: &Value, coords: Coordinates, captured_at: &str) -> ParkingSpot {
    let sensor_id = text(record, "sensor_id");
    let kerbside_id = text(record, "kerbsideid");
    let bay_id = text(record, "bay_id");
    let zone_number = text(record, "zone_number");
    let street_name = text(record, "street_name");

    let external_id = sensor_id
        .clone()
        .or_else(|| kerbside_id.clone())
        .or_else(|| bay_id.clone());
    let id = external_id.clone().unwrap_or_else(generated_id);

    let street = street_name.clone().unwrap_or_else(|| {
        let label = zone_number
            .as_deref()
            .or(bay_id.as_deref())
            .unwrap_or("Unknown");
        format!("Parking Lot {label}")
    });
    let area = street_name
        .or_else(|| text(record, "between_street1"))
        .unwrap_or_else(|| DEFAULT_AREA.to_string());

    ParkingSpot {
        id,
        external_id,
        sensor_id,
        bay_id: bay_id.or(kerbside_id),
        name: street.clone(),
        latitude: coords.latitude,
        longitude: coords.longitude,
        street_name: street,
        zone_number,
        status: status_of(record),
        parking_type: DEFAULT_PARKING_TYPE.to_string(),
        capacity: 1,
        restrictions: restrictions_of(record),
        cost_info: CostInfo::default(),
        last_updated: text(record, "lastupdated").unwrap_or_else(|| captured_at.to_string()),
        area,
    }
}
