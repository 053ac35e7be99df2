//! Great-circle distance between coordinate pairs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Melbourne CBD, the default centre for searches.
pub const MELBOURNE_CBD: Coordinates = Coordinates {
    latitude: -37.8136,
    longitude: 144.9631,
};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Error returned when a coordinate literal cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinates: {reason}")]
pub struct InvalidCoordinates {
    reason: &'static str,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parse a `"lat,lng"` literal.
    ///
    /// Latitude must lie in [-90, 90] and longitude in [-180, 180].
    ///
    /// ```
    /// use parking_server::geo::Coordinates;
    ///
    /// let c = Coordinates::parse_pair("-37.8136, 144.9631").unwrap();
    /// assert_eq!(c.latitude, -37.8136);
    ///
    /// assert!(Coordinates::parse_pair("Flinders Street").is_err());
    /// assert!(Coordinates::parse_pair("95.0,10.0").is_err());
    /// ```
    pub fn parse_pair(s: &str) -> Result<Self, InvalidCoordinates> {
        let (lat, lng) = s.split_once(',').ok_or(InvalidCoordinates {
            reason: "expected \"lat,lng\"",
        })?;

        let latitude: f64 = lat.trim().parse().map_err(|_| InvalidCoordinates {
            reason: "latitude is not a number",
        })?;
        let longitude: f64 = lng.trim().parse().map_err(|_| InvalidCoordinates {
            reason: "longitude is not a number",
        })?;

        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidCoordinates {
                reason: "latitude out of range",
            });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidCoordinates {
                reason: "longitude out of range",
            });
        }

        Ok(Self::new(latitude, longitude))
    }

    /// Distance to another point in kilometres.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        distance_km(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

fn degrees_to_radians(degrees: f64) -> f64 {
    degrees * (std::f64::consts::PI / 180.0)
}

/// Haversine distance between two points, in kilometres.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = degrees_to_radians(lat2 - lat1);
    let d_lon = degrees_to_radians(lon2 - lon1);

    let a = (d_lat / 2.0).sin().powi(2)
        + degrees_to_radians(lat1).cos()
            * degrees_to_radians(lat2).cos()
            * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        assert_eq!(distance_km(-37.8136, 144.9631, -37.8136, 144.9631), 0.0);
    }

    #[test]
    fn hundredth_degree_latitude_is_about_1_11_km() {
        let d = distance_km(-37.8136, 144.9631, -37.8036, 144.9631);
        assert!((d - 1.11).abs() < 0.05, "got {d}");
    }

    #[test]
    fn melbourne_to_sydney() {
        // Roughly 714 km as the crow flies
        let d = distance_km(-37.8136, 144.9631, -33.8688, 151.2093);
        assert!((d - 714.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn distance_to_matches_free_function() {
        let a = Coordinates::new(-37.81, 144.96);
        let b = Coordinates::new(-37.82, 144.97);
        assert_eq!(
            a.distance_to(&b),
            distance_km(-37.81, 144.96, -37.82, 144.97)
        );
    }

    #[test]
    fn parse_pair_rejects_garbage() {
        assert!(Coordinates::parse_pair("").is_err());
        assert!(Coordinates::parse_pair("1.0").is_err());
        assert!(Coordinates::parse_pair("a,b").is_err());
        assert!(Coordinates::parse_pair("10.0,200.0").is_err());
        assert!(Coordinates::parse_pair("NaN,1.0").is_err());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let c = Coordinates::new(-37.8136, 144.9631);
        assert_eq!(Coordinates::parse_pair(&c.to_string()).unwrap(), c);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn lat() -> impl Strategy<Value = f64> {
        -89.0f64..89.0
    }

    fn lon() -> impl Strategy<Value = f64> {
        -179.0f64..179.0
    }

    proptest! {
        #[test]
        fn distance_to_self_is_zero(a in lat(), b in lon()) {
            prop_assert!(distance_km(a, b, a, b).abs() < 1e-9);
        }

        #[test]
        fn distance_is_symmetric(a1 in lat(), b1 in lon(), a2 in lat(), b2 in lon()) {
            let ab = distance_km(a1, b1, a2, b2);
            let ba = distance_km(a2, b2, a1, b1);
            prop_assert!((ab - ba).abs() < 1e-9, "{} vs {}", ab, ba);
        }

        #[test]
        fn distance_is_bounded_by_half_circumference(
            a1 in lat(), b1 in lon(), a2 in lat(), b2 in lon()
        ) {
            let d = distance_km(a1, b1, a2, b2);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
        }
    }
}
