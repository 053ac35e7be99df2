//! Per-client request limiting for the API routes.
//!
//! Each client IP gets a fixed window: the first request opens it, and at
//! most `max_requests` are admitted until it closes. Expired windows are
//! swept every `cleanup_interval` requests, and at most `max_tracked_ips`
//! clients are tracked at once.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::routes::AppError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests admitted per client per window.
    pub max_requests: u32,

    pub window: Duration,

    /// Sweep expired windows every this many requests.
    pub cleanup_interval: u64,

    /// Upper bound on clients tracked at once.
    pub max_tracked_ips: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window: Duration::from_secs(15 * 60),
            cleanup_interval: 100,
            max_tracked_ips: 10_000,
        }
    }
}

impl RateLimitConfig {
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_max_tracked_ips(mut self, max_tracked_ips: usize) -> Self {
        self.max_tracked_ips = max_tracked_ips;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// In-memory fixed-window limiter keyed by client IP.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<IpAddr, Window>>,
    requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            requests: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request from `ip`.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();

        let seen = self.requests.fetch_add(1, Ordering::Relaxed);
        if seen > 0 && seen % self.config.cleanup_interval.max(1) == 0 {
            debug!(requests = seen, "sweeping expired rate limit windows");
            self.cleanup();
        }

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if !windows.contains_key(&ip) && windows.len() >= self.config.max_tracked_ips {
            windows.retain(|_, w| w.resets_at > now);
            if windows.len() >= self.config.max_tracked_ips {
                warn!(%ip, tracked = windows.len(), "rate limiter full, rejecting new client");
                return false;
            }
        }

        let window = windows.entry(ip).or_insert(Window {
            count: 0,
            resets_at: now + self.config.window,
        });

        if now >= window.resets_at {
            *window = Window {
                count: 0,
                resets_at: now + self.config.window,
            };
        }

        if window.count >= self.config.max_requests {
            warn!(%ip, max = self.config.max_requests, "rate limit exceeded");
            return false;
        }

        window.count += 1;
        true
    }

    /// Drop clients whose window has closed.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, w| w.resets_at > now);
    }

    pub fn tracked_ips(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Middleware that answers 429 once a client exhausts its window.
///
/// Requests without connection info (in-process callers) share one bucket.
pub async fn limit_requests(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if limiter.check(ip) {
        next.run(request).await
    } else {
        AppError::TooManyRequests.into_response()
    }
}
