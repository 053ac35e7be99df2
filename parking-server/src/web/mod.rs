//! Web layer for the parking server.
//!
//! JSON endpoints over the spot cache, the zone reference store and the
//! search engine.

mod dto;
mod rate_limit;
mod routes;
mod state;

pub use dto::*;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use routes::{AppError, create_router};
pub use state::AppState;
