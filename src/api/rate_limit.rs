//! Per-client request quotas.
//!
//! Each client address gets two fixed windows, one hour and one day long. A
//! request passes only when both windows still have room, and only a request
//! that passes is counted.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::AppState;

use super::error::ApiError;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// One fixed counting window
#[derive(Debug, Clone)]
struct Window {
    count: u32,
    start: Instant,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self { count: 0, start: now }
    }

    /// Start a fresh window if `length` has elapsed.
    fn roll(&mut self, now: Instant, length: Duration) {
        if now.duration_since(self.start) >= length {
            self.count = 0;
            self.start = now;
        }
    }

    fn reset_after(&self, now: Instant, length: Duration) -> u64 {
        length.saturating_sub(now.duration_since(self.start)).as_secs().max(1)
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    hourly: Window,
    daily: Window,
}

impl RateLimitEntry {
    fn new(now: Instant) -> Self {
        Self {
            hourly: Window::new(now),
            daily: Window::new(now),
        }
    }
}

/// Thread-safe rate limiter using dashmap
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<IpAddr, RateLimitEntry>,
    config: RateLimitConfig,
}

/// Quota state after an allowed request
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitInfo {
    /// Hourly quota
    pub limit: u32,
    /// Requests left in the current hour, capped by what is left today
    pub remaining: u32,
    /// Seconds until the hourly window resets
    pub reset_after: u64,
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimited {
    /// Which quota was exhausted, "hour" or "day"
    pub window: &'static str,
    pub limit: u32,
    pub retry_after: u64,
}

impl IntoResponse for RateLimited {
    fn into_response(self) -> Response {
        let mut response = ApiError::rate_limited(format!(
            "Rate limit exceeded: {} requests per {}. Try again in {} seconds.",
            self.limit, self.window, self.retry_after
        ))
        .into_response();

        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after));
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
        response
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Whether `path` bypasses the limiter
    pub fn is_exempt(&self, path: &str) -> bool {
        self.config.exempt_paths.iter().any(|p| p == path)
    }

    /// Count a request from `ip` if both windows have room.
    pub fn check(&self, ip: IpAddr) -> Result<RateLimitInfo, RateLimited> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<RateLimitInfo, RateLimited> {
        let per_hour = self.config.requests_per_hour;
        let per_day = self.config.requests_per_day;

        if !self.config.enabled {
            return Ok(RateLimitInfo {
                limit: u32::MAX,
                remaining: u32::MAX,
                reset_after: 0,
            });
        }

        let mut entry = self
            .entries
            .entry(ip)
            .or_insert_with(|| RateLimitEntry::new(now));

        entry.hourly.roll(now, HOUR);
        entry.daily.roll(now, DAY);

        if entry.daily.count >= per_day {
            return Err(RateLimited {
                window: "day",
                limit: per_day,
                retry_after: entry.daily.reset_after(now, DAY),
            });
        }
        if entry.hourly.count >= per_hour {
            return Err(RateLimited {
                window: "hour",
                limit: per_hour,
                retry_after: entry.hourly.reset_after(now, HOUR),
            });
        }

        entry.hourly.count += 1;
        entry.daily.count += 1;

        Ok(RateLimitInfo {
            limit: per_hour,
            remaining: (per_hour - entry.hourly.count).min(per_day - entry.daily.count),
            reset_after: entry.hourly.reset_after(now, HOUR),
        })
    }

    /// Drop entries whose daily window has ended
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, entry| now.duration_since(entry.daily.start) < DAY);
    }

    /// Get the number of tracked entries (for monitoring)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Client address: proxy headers first, then the socket peer.
pub fn extract_client_ip(request: &Request<Body>) -> IpAddr {
    let headers = request.headers();

    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded
            .split(',')
            .next()
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return ip;
        }
    }

    if let Some(ip) = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Rate limiting middleware applied to the whole router
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let limiter = &state.rate_limiter;
    if limiter.is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = extract_client_ip(&request);

    match limiter.check(ip) {
        Ok(info) => {
            let mut response = next.run(request).await;
            if limiter.config().enabled {
                let headers = response.headers_mut();
                headers.insert("x-ratelimit-limit", HeaderValue::from(info.limit));
                headers.insert("x-ratelimit-remaining", HeaderValue::from(info.remaining));
                headers.insert("x-ratelimit-reset", HeaderValue::from(info.reset_after));
            }
            response
        }
        Err(limited) => {
            tracing::warn!(
                ip = %ip,
                window = limited.window,
                limit = limited.limit,
                "Rate limit exceeded"
            );
            limited.into_response()
        }
    }
}

/// Spawn a background task to periodically clean up expired rate limit entries
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                "Rate limiter cleanup complete, {} entries remaining",
                rate_limiter.entry_count()
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_day: 8,
            requests_per_hour: 3,
            exempt_paths: vec!["/".to_string()],
            cleanup_interval: 300,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_allows_requests_under_hourly_limit() {
        let limiter = RateLimiter::new(test_config());
        let client = ip("192.168.1.1");

        for i in 0..3 {
            let info = limiter.check(client).expect("request should pass");
            assert_eq!(info.remaining, 2 - i);
            assert_eq!(info.limit, 3);
        }
    }

    #[test]
    fn test_blocks_after_hourly_limit() {
        let limiter = RateLimiter::new(test_config());
        let client = ip("192.168.1.1");

        for _ in 0..3 {
            limiter.check(client).unwrap();
        }

        let err = limiter.check(client).unwrap_err();
        assert_eq!(err.window, "hour");
        assert_eq!(err.limit, 3);
        assert!(err.retry_after > 0);
    }

    #[test]
    fn test_hour_rollover_then_daily_limit() {
        let limiter = RateLimiter::new(test_config());
        let client = ip("10.0.0.1");
        let start = Instant::now();

        // 3 per hour across three hours reaches 8 per day partway through hour three.
        let mut passed = 0;
        for hour in 0..3u64 {
            let at = start + HOUR * hour as u32;
            for _ in 0..3 {
                if limiter.check_at(client, at).is_ok() {
                    passed += 1;
                }
            }
        }
        assert_eq!(passed, 8);

        let later = start + HOUR * 5;
        let err = limiter.check_at(client, later).unwrap_err();
        assert_eq!(err.window, "day");

        let next_day = start + DAY;
        assert!(limiter.check_at(client, next_day).is_ok());
    }

    #[test]
    fn test_rejected_requests_are_not_counted() {
        let limiter = RateLimiter::new(test_config());
        let client = ip("10.0.0.2");
        let start = Instant::now();

        for _ in 0..10 {
            let _ = limiter.check_at(client, start);
        }

        // Only the three passing requests count against the day.
        let next_hour = start + HOUR;
        let info = limiter.check_at(client, next_hour).unwrap();
        assert_eq!(info.remaining, 2);
    }

    #[test]
    fn test_different_ips_have_separate_limits() {
        let limiter = RateLimiter::new(test_config());
        let ip1 = ip("192.168.1.1");
        let ip2 = ip("192.168.1.2");

        for _ in 0..3 {
            limiter.check(ip1).unwrap();
        }

        assert!(limiter.check(ip1).is_err());
        assert!(limiter.check(ip2).is_ok());
    }

    #[test]
    fn test_disabled_rate_limiting() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);
        let client = ip("192.168.1.1");

        for _ in 0..100 {
            assert!(limiter.check(client).is_ok());
        }
        assert_eq!(limiter.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_rejection_renders_error_body_and_headers() {
        use axum::http::StatusCode;
        use http_body_util::BodyExt;

        let response = RateLimited {
            window: "hour",
            limit: 20,
            retry_after: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert_eq!(response.headers()["x-ratelimit-limit"], "20");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["code"], "too_many_requests");
        assert!(json["message"].as_str().unwrap().contains("20 requests per hour"));
    }

    #[test]
    fn test_exempt_paths() {
        let limiter = RateLimiter::new(test_config());
        assert!(limiter.is_exempt("/"));
        assert!(!limiter.is_exempt("/products"));
    }

    #[test]
    fn test_cleanup_keeps_recent_entries() {
        let limiter = RateLimiter::new(test_config());
        limiter.check(ip("192.168.1.1")).unwrap();
        assert_eq!(limiter.entry_count(), 1);

        limiter.cleanup_expired();
        assert_eq!(limiter.entry_count(), 1);
    }

    #[test]
    fn test_extract_client_ip_prefers_forwarded_header() {
        let request = Request::builder()
            .uri("/products")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request), ip("203.0.113.7"));

        let request = Request::builder()
            .uri("/products")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request), ip("198.51.100.2"));
    }

    #[test]
    fn test_extract_client_ip_falls_back_to_peer_then_loopback() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&request), ip("127.0.0.1"));

        let peer: SocketAddr = "192.0.2.9:5555".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(extract_client_ip(&request), ip("192.0.2.9"));
    }
}
