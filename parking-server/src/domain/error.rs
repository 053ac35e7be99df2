//! Error kinds surfaced by the parking core.
//!
//! Per-endpoint fetch failures are absorbed inside a refresh and never
//! appear here; see `upstream::FetchError`.

/// Errors returned by the spot cache, zone store and search engine.
///
/// `Clone` so that callers coalesced onto one in-flight refresh can all
/// receive the same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParkingError {
    /// Zone reference data is missing or unreadable
    #[error("zone reference data unavailable: {message}")]
    DataUnavailable { message: String },

    /// An upstream payload matched none of the known shapes
    #[error("unrecognized upstream response format (top-level keys: {})", .keys.join(", "))]
    UnrecognizedFormat { keys: Vec<String> },

    /// Every configured endpoint failed or returned no usable spots
    #[error("all {attempts} upstream endpoints failed")]
    AllEndpointsFailed { attempts: usize },

    /// Cost lookup for a zone with no reference record
    #[error("unknown parking zone: {zone_id}")]
    UnknownZone { zone_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ParkingError::DataUnavailable {
            message: "file not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "zone reference data unavailable: file not found"
        );

        let err = ParkingError::UnrecognizedFormat {
            keys: vec!["total_count".into(), "links".into()],
        };
        assert_eq!(
            err.to_string(),
            "unrecognized upstream response format (top-level keys: total_count, links)"
        );

        let err = ParkingError::AllEndpointsFailed { attempts: 3 };
        assert_eq!(err.to_string(), "all 3 upstream endpoints failed");

        let err = ParkingError::UnknownZone {
            zone_id: "7551".into(),
        };
        assert_eq!(err.to_string(), "unknown parking zone: 7551");
    }
}
