//! Melbourne on-street parking server.
//!
//! Ingests live bay sensor data from the city's open-data portal, keeps a
//! time-bounded cache of it, and joins it with zone restriction reference
//! data to answer search, recommendation and cost queries.

pub mod cache;
pub mod config;
pub mod domain;
pub mod geo;
pub mod geocode;
pub mod search;
pub mod upstream;
pub mod web;
pub mod zones;
