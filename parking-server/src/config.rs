//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::upstream::UpstreamConfig;
use crate::web::RateLimitConfig;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";
const DEFAULT_ZONE_DATA_PATH: &str = "data/parking_zones.csv";

/// Delay before the first background refresh.
pub const INITIAL_REFRESH_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything `main` needs to start the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub zone_data_path: PathBuf,
    pub upstream: UpstreamConfig,
    /// Serve upstream payloads from this directory instead of the network
    pub mock_dir: Option<PathBuf>,
    pub mapbox_token: Option<String>,
    pub cache: CacheConfig,
    pub refresh_interval: Duration,
    pub rate_limit: RateLimitConfig,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if it is set.
    ///
    /// | variable                | default                    |
    /// |-------------------------|----------------------------|
    /// | `BIND_ADDR`             | `127.0.0.1:3001`           |
    /// | `ZONE_DATA_PATH`        | `data/parking_zones.csv`   |
    /// | `PARKING_ENDPOINTS`     | open-data endpoints        |
    /// | `PARKING_MOCK_DIR`      | unset                      |
    /// | `MAPBOX_ACCESS_TOKEN`   | unset                      |
    /// | `CACHE_TTL_SECS`        | 300                        |
    /// | `REFRESH_INTERVAL_SECS` | 300                        |
    /// | `UPSTREAM_TIMEOUT_SECS` | 30                         |
    /// | `RATE_LIMIT_REQUESTS`   | 1000                       |
    /// | `RATE_LIMIT_WINDOW_SECS`| 900                        |
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "BIND_ADDR",
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let timeout_secs = whole(&get, "UPSTREAM_TIMEOUT_SECS", 30)?;
        let mut upstream = UpstreamConfig::default().with_timeout(timeout_secs);
        if let Some(list) = get("PARKING_ENDPOINTS") {
            let endpoints: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            upstream = upstream.with_endpoints(endpoints);
        }

        let cache = CacheConfig::default()
            .with_ttl(Duration::from_secs(whole(&get, "CACHE_TTL_SECS", 300)?))
            .with_attempt_timeout(Duration::from_secs(timeout_secs));

        let max_requests = whole(&get, "RATE_LIMIT_REQUESTS", 1000)?;
        let rate_limit = RateLimitConfig::default()
            .with_max_requests(u32::try_from(max_requests).unwrap_or(u32::MAX))
            .with_window(Duration::from_secs(whole(&get, "RATE_LIMIT_WINDOW_SECS", 900)?));

        Ok(Self {
            bind_addr,
            zone_data_path: get("ZONE_DATA_PATH")
                .unwrap_or_else(|| DEFAULT_ZONE_DATA_PATH.to_string())
                .into(),
            upstream,
            mock_dir: get("PARKING_MOCK_DIR").map(PathBuf::from),
            mapbox_token: get("MAPBOX_ACCESS_TOKEN"),
            cache,
            refresh_interval: Duration::from_secs(whole(&get, "REFRESH_INTERVAL_SECS", 300)?),
            rate_limit,
        })
    }
}

/// A non-negative whole number, or `default` when unset.
fn whole(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }
        }),
    }
}
