//! Domain types for the parking server.

mod error;
mod spot;

pub use error::ParkingError;
pub use spot::{CostInfo, ParkingSpot, Restrictions, SpotStatus};

#[cfg(test)]
pub(crate) use spot::fixtures;
