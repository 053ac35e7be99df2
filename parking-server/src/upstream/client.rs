//! HTTP client for the open-data sensor endpoints.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;

use super::SpotSource;
use super::error::FetchError;

/// Endpoints tried in order: records API, JSON export, GeoJSON export.
pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "https://data.melbourne.vic.gov.au/api/explore/v2.1/catalog/datasets/on-street-parking-bay-sensors/records?limit=10000&timezone=Australia%2FMelbourne&select=*",
    "https://data.melbourne.vic.gov.au/api/explore/v2.1/catalog/datasets/on-street-parking-bay-sensors/exports/json?timezone=Australia%2FMelbourne",
    "https://data.melbourne.vic.gov.au/api/explore/v2.1/catalog/datasets/on-street-parking-bay-sensors/exports/geojson?timezone=Australia%2FMelbourne",
];

pub const USER_AGENT: &str = "Melbourne-Parking-App/1.0";

/// Configuration for the upstream feed.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Endpoint URLs, in fallback order
    pub endpoints: Vec<String>,
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            user_agent: USER_AGENT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl UpstreamConfig {
    /// Replace the endpoint list.
    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fetches payloads over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpSpotSource {
    http: reqwest::Client,
}

impl HttpSpotSource {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self { http })
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| FetchError::Json {
            message: e.to_string(),
        })
    }
}

impl SpotSource for HttpSpotSource {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
        Box::pin(self.get_json(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = UpstreamConfig::default();
        assert_eq!(config.endpoints.len(), 3);
        assert!(config.endpoints[0].contains("/records?limit=10000"));
        assert!(config.endpoints[2].contains("/exports/geojson"));
        assert_eq!(config.user_agent, "Melbourne-Parking-App/1.0");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn config_builders() {
        let config = UpstreamConfig::default()
            .with_endpoints(vec!["http://localhost:9000/a".into()])
            .with_timeout(5);
        assert_eq!(config.endpoints, vec!["http://localhost:9000/a"]);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(HttpSpotSource::new(&UpstreamConfig::default()).is_ok());
    }
}
