use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    length: Duration,
    hits: u32,
}

/// Fixed-window request counters keyed by `scope:client`.
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request; `false` once the window already holds `limit` hits.
    pub fn hit(&self, key: &str, limit: u32, length: Duration) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            length,
            hits: 0,
        });
        let window = entry.value_mut();
        if now.duration_since(window.started) >= window.length {
            *window = Window {
                started: now,
                length,
                hits: 0,
            };
        }
        if window.hits >= limit {
            return false;
        }
        window.hits += 1;
        true
    }

    /// Drops windows that have run out.
    pub fn sweep(&self) {
        let before = self.len();
        self.windows
            .retain(|_, w| w.started.elapsed() < w.length);
        debug!(removed = before.saturating_sub(self.len()), "rate limiter swept");
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }
}

/// One limit applied to a route or to the whole router.
#[derive(Clone)]
pub struct Throttle {
    pub scope: &'static str,
    pub limit: u32,
    pub window: Duration,
    pub limiter: Arc<RateLimiter>,
}

pub async fn throttle(
    State(rule): State<Throttle>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&req);
    let key = format!("{}:{}", rule.scope, client);
    if !rule.limiter.hit(&key, rule.limit, rule.window) {
        warn!(scope = rule.scope, %client, limit = rule.limit, "rate limit exceeded");
        return Err(AppError::TooManyRequests);
    }
    Ok(next.run(req).await)
}

/// First `X-Forwarded-For` hop, else the peer address.
pub fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
