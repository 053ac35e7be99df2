//! Parking cost estimates by restriction code.

use serde::Serialize;

pub const CURRENCY: &str = "AUD";

/// Estimated cost of parking in one zone for a given duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub zone_id: String,
    pub restriction_display: String,
    /// Hours
    pub duration: f64,
    pub cost: f64,
    pub currency: String,
}

/// Cost for `duration_hours` under a restriction code, rounded to cents.
///
/// | code   | rate/hour | cap   |
/// |--------|-----------|-------|
/// | `1P`   | 2.50      |       |
/// | `2P`   | 2.00      | 4.00  |
/// | `4P`   | 1.50      | 6.00  |
/// | `MP2P` | 1.75      | 3.50  |
/// | other  | 3.00      |       |
pub fn estimate_cost(code: &str, duration_hours: f64) -> f64 {
    let cost = match code {
        "1P" => duration_hours * 2.50,
        "2P" => (duration_hours * 2.00).min(4.00),
        "4P" => (duration_hours * 1.50).min(6.00),
        "MP2P" => (duration_hours * 1.75).min(3.50),
        _ => duration_hours * 3.00,
    };
    (cost * 100.0).round() / 100.0
}
