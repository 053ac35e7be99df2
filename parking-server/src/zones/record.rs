//! Zone restriction record and CSV parsing.

use std::collections::HashMap;

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::ParkingError;

const ZONE_ID_COLUMN: &str = "ParkingZone";
const DAYS_COLUMN: &str = "Restriction_Days";
const START_COLUMN: &str = "Time_Restrictions_Start";
const FINISH_COLUMN: &str = "Time_Restrictions_Finish";
const DISPLAY_COLUMN: &str = "Restriction_Display";

/// Restriction metadata for one parking zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    #[serde(rename = "parking_zone_id")]
    pub zone_id: String,
    pub restriction_days: String,
    pub time_restriction_start: String,
    pub time_restriction_finish: String,
    /// Display code such as "2P", "4P" or "MP2P".
    pub restriction_display: String,
}

impl ZoneRecord {
    /// Maximum permitted stay encoded by the display code, in hours.
    pub fn permitted_hours(&self) -> Option<f64> {
        permitted_hours(&self.restriction_display)
    }
}

/// Permitted stay encoded by a restriction display code, in hours.
///
/// `nP` and `MPnP` mean n hours, `LZnn` and `nnMIN` mean nn minutes and
/// `1/2P` / `1/4P` are fractions of an hour. Codes without a duration
/// (such as "QP", "SP" or "PP") return `None`.
///
/// ```
/// use parking_server::zones::permitted_hours;
///
/// assert_eq!(permitted_hours("2P"), Some(2.0));
/// assert_eq!(permitted_hours("MP4P"), Some(4.0));
/// assert_eq!(permitted_hours("LZ30"), Some(0.5));
/// assert_eq!(permitted_hours("PP"), None);
/// ```
pub fn permitted_hours(code: &str) -> Option<f64> {
    let code = code.trim().to_ascii_uppercase();

    if let Some(mins) = code.strip_prefix("LZ") {
        return mins.parse::<u32>().ok().map(|m| f64::from(m) / 60.0);
    }
    if let Some(mins) = code.strip_suffix("MIN") {
        return mins.parse::<u32>().ok().map(|m| f64::from(m) / 60.0);
    }

    let body = code.strip_prefix("MP").unwrap_or(&code);
    let hours = body.strip_suffix('P')?;

    if let Some((num, den)) = hours.split_once('/') {
        let num: u32 = num.parse().ok()?;
        let den: u32 = den.parse().ok()?;
        if den == 0 {
            return None;
        }
        return Some(f64::from(num) / f64::from(den));
    }

    hours.parse::<u32>().ok().map(f64::from)
}

/// Parse the zone reference CSV into a map keyed by zone id.
///
/// The first line is the header. Blank lines are skipped, rows without a
/// zone id are skipped, and a later row with a duplicate zone id replaces
/// the earlier one.
pub fn parse_zones(raw: &str) -> Result<HashMap<String, ZoneRecord>, ParkingError> {
    if raw.trim().is_empty() {
        return Err(ParkingError::DataUnavailable {
            message: "zone reference data is empty".to_string(),
        });
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParkingError::DataUnavailable {
            message: format!("failed to read zone data header: {e}"),
        })?
        .clone();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let zone_idx = column(ZONE_ID_COLUMN);
    let days_idx = column(DAYS_COLUMN);
    let start_idx = column(START_COLUMN);
    let finish_idx = column(FINISH_COLUMN);
    let display_idx = column(DISPLAY_COLUMN);

    if zone_idx.is_none() {
        warn!(
            column = ZONE_ID_COLUMN,
            "zone data header has no zone id column; every row will be skipped"
        );
    }

    let mut zones = HashMap::new();

    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                debug!(line = line + 2, error = %e, "skipping unreadable zone row");
                continue;
            }
        };

        let field = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .unwrap_or_default()
                .to_string()
        };

        let zone_id = field(zone_idx);
        if zone_id.is_empty() {
            continue;
        }

        let record = ZoneRecord {
            zone_id: zone_id.clone(),
            restriction_days: field(days_idx),
            time_restriction_start: field(start_idx),
            time_restriction_finish: field(finish_idx),
            restriction_display: field(display_idx),
        };

        zones.insert(zone_id, record);
    }

    Ok(zones)
}
