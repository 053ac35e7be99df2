//! Mock spot source for testing and offline development.
//!
//! Serves canned payloads keyed by URL. Payloads can be loaded from a
//! directory of JSON files so the server can run without network access.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::RwLock;

use super::SpotSource;
use super::error::FetchError;

/// URL scheme for payloads loaded from disk.
const MOCK_SCHEME: &str = "mock://";

#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Raw(String),
    Status(u16),
}

#[derive(Debug, Clone)]
struct Canned {
    reply: Reply,
    delay: Option<Duration>,
}

/// Mock source that serves canned replies per URL.
///
/// Unknown URLs answer with a 404 status error.
#[derive(Clone, Default)]
pub struct MockSpotSource {
    replies: Arc<RwLock<HashMap<String, Canned>>>,
    calls: Arc<AtomicUsize>,
}

impl MockSpotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in a directory.
    ///
    /// Each file is served at `mock://{file stem}`. Returns the source and
    /// the URLs in file-name order, ready to use as the endpoint list.
    pub fn from_dir(data_dir: impl AsRef<Path>) -> Result<(Self, Vec<String>), FetchError> {
        let data_dir = data_dir.as_ref();
        let mut replies = HashMap::new();

        let entries = std::fs::read_dir(data_dir).map_err(|e| FetchError::Status {
            status: 0,
            message: format!("Failed to read mock data directory: {}", e),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| FetchError::Status {
                status: 0,
                message: format!("Failed to read directory entry: {}", e),
            })?;

            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let json = std::fs::read_to_string(&path).map_err(|e| FetchError::Status {
                status: 0,
                message: format!("Failed to read {:?}: {}", path, e),
            })?;

            let payload: Value = serde_json::from_str(&json).map_err(|e| FetchError::Json {
                message: format!("Failed to parse {:?}: {}", path, e),
            })?;

            replies.insert(
                format!("{MOCK_SCHEME}{stem}"),
                Canned {
                    reply: Reply::Json(payload),
                    delay: None,
                },
            );
        }

        if replies.is_empty() {
            return Err(FetchError::Status {
                status: 0,
                message: format!("No mock payload files found in {:?}", data_dir),
            });
        }

        let mut urls: Vec<String> = replies.keys().cloned().collect();
        urls.sort();

        let source = Self {
            replies: Arc::new(RwLock::new(replies)),
            calls: Arc::default(),
        };
        Ok((source, urls))
    }

    fn with_reply(self, url: &str, reply: Reply, delay: Option<Duration>) -> Self {
        // Builders run before the source is shared
        if let Ok(mut replies) = self.replies.try_write() {
            replies.insert(url.to_string(), Canned { reply, delay });
        }
        self
    }

    /// Serve a JSON payload at `url`.
    pub fn with_payload(self, url: &str, payload: Value) -> Self {
        self.with_reply(url, Reply::Json(payload), None)
    }

    /// Serve a JSON payload after a delay.
    pub fn with_delayed_payload(self, url: &str, payload: Value, delay: Duration) -> Self {
        self.with_reply(url, Reply::Json(payload), Some(delay))
    }

    /// Answer `url` with a non-success status.
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.with_reply(url, Reply::Status(status), None)
    }

    /// Answer `url` with a body that is not JSON.
    pub fn with_raw_body(self, url: &str, body: &str) -> Self {
        self.with_reply(url, Reply::Raw(body.to_string()), None)
    }

    /// Replace the reply for `url` on a shared source.
    pub async fn set_payload(&self, url: &str, payload: Value) {
        self.replies.write().await.insert(
            url.to_string(),
            Canned {
                reply: Reply::Json(payload),
                delay: None,
            },
        );
    }

    /// Make `url` fail with a status from now on.
    pub async fn set_status(&self, url: &str, status: u16) {
        self.replies.write().await.insert(
            url.to_string(),
            Canned {
                reply: Reply::Status(status),
                delay: None,
            },
        );
    }

    /// Number of fetches served so far, across all URLs.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpotSource for MockSpotSource {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let canned = self.replies.read().await.get(url).cloned();
            let Some(canned) = canned else {
                return Err(FetchError::Status {
                    status: 404,
                    message: format!("No mock payload for {url}"),
                });
            };

            if let Some(delay) = canned.delay {
                tokio::time::sleep(delay).await;
            }

            match canned.reply {
                Reply::Json(payload) => Ok(payload),
                Reply::Raw(body) => serde_json::from_str(&body).map_err(|e| FetchError::Json {
                    message: e.to_string(),
                }),
                Reply::Status(status) => Err(FetchError::Status {
                    status,
                    message: "mock error".to_string(),
                }),
            }
        })
    }
}
