//! Spot search, recommendation and cost estimation.
//!
//! Joins live spots from the cache with zone restriction records from the
//! reference store. Each request reads one cache snapshot and one zone map,
//! so a reload in the middle of a request cannot mix two versions.

mod config;
mod cost;
mod engine;
mod rank;

pub use config::SearchConfig;
pub use cost::{CURRENCY, CostEstimate, estimate_cost};
pub use engine::{
    EnrichedSpot, MatchReport, MatchedSpot, SearchEngine, SpotZoneSample, ZoneStats,
};
pub use rank::{RANK_ORDER, rank_spots, restriction_rank};
