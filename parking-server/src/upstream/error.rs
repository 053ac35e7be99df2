//! Upstream fetch error types.

/// Errors from a single attempt against one upstream endpoint.
///
/// These are logged by the refresh loop and never returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed (network error, client timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint returned a non-success status
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// Body was not valid JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// Attempt exceeded the per-endpoint deadline
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
}
