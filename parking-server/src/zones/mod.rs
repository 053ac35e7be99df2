//! Zone restriction reference data.
//!
//! Provides zone id → restriction record mapping, loaded from the city's
//! zone restriction CSV at startup and reloadable on demand.

mod record;
mod source;
mod store;

pub use record::{ZoneRecord, parse_zones, permitted_hours};
pub use source::{FileZoneSource, InlineZoneSource, ZoneSource};
pub use store::ZoneReferenceStore;

#[cfg(test)]
pub(crate) use store::fixtures;
