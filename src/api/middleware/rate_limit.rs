//! Rate limiting stage.
//!
//! Counts every request against its client's window in the shared
//! [`RateLimiter`]. Allowed requests continue to the router; rejected ones get
//! `429 Too Many Requests` with `{"error": "Too many requests"}` and never reach a handler.
//!
//! # Response Headers
//!
//! - `X-RateLimit-Limit` - requests allowed per window
//! - `X-RateLimit-Remaining` - requests left in the current window
//! - `X-RateLimit-Reset` - seconds until the window resets
//! - `Retry-After` - on 429 only
//!
//! # Key Extraction
//!
//! The client key is the socket peer IP. With `behind_proxy` the first address in
//! `X-Forwarded-For` (or `X-Real-IP`) is used instead; enable that only behind a trusted
//! reverse proxy, since clients can set these headers freely. Requests without any
//! address share the empty-key bucket.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::domain::rate_limiter::{Decision, RateLimiter};
use crate::error::AppError;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// State for the rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiter,
    pub behind_proxy: bool,
    /// Exact paths that bypass the limiter (health probes).
    pub exempt_paths: Arc<[String]>,
}

impl RateLimitState {
    pub fn new(limiter: RateLimiter, behind_proxy: bool) -> Self {
        Self {
            limiter,
            behind_proxy,
            exempt_paths: Arc::from(Vec::new()),
        }
    }

    pub fn with_exempt_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.exempt_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|p| p == path)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    from_xff.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}

/// Derives the rate limit key for a request.
pub fn client_key(req: &Request, behind_proxy: bool) -> String {
    if behind_proxy && let Some(ip) = forwarded_ip(req.headers()) {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

fn set_headers(headers: &mut HeaderMap, limit: u64, remaining: u64, reset_after: Duration) {
    let reset = reset_after.as_secs_f64().ceil() as u64;
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
}

/// Rate limiting middleware.
///
/// # Example
///
/// ```rust,ignore
/// let state = RateLimitState::new(RateLimiter::new(1000, Duration::from_secs(60)), false);
/// let app = Router::new()
///     .route("/track", post(track_handler))
///     .layer(middleware::from_fn_with_state(state, rate_limit::layer));
/// ```
pub async fn layer(State(st): State<RateLimitState>, req: Request, next: Next) -> Response {
    if st.is_exempt(req.uri().path()) {
        return next.run(req).await;
    }

    let key = client_key(&req, st.behind_proxy);

    match st.limiter.check(&key, Instant::now()) {
        Decision::Allow {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(req).await;
            set_headers(response.headers_mut(), limit, remaining, reset_after);
            response
        }
        Decision::Reject { limit, retry_after } => {
            tracing::warn!(client = %key, path = %req.uri().path(), "Rate limit exceeded");
            metrics::counter!("gateway_rate_limited_total").increment(1);

            let mut response = AppError::RateLimited { retry_after }.into_response();
            set_headers(response.headers_mut(), limit, 0, retry_after);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(peer: Option<&str>, headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn test_peer_address_is_default_key() {
        let req = request(
            Some("192.0.2.7:51000"),
            &[("x-forwarded-for", "203.0.113.9")],
        );
        assert_eq!(client_key(&req, false), "192.0.2.7");
    }

    #[test]
    fn test_forwarded_for_behind_proxy() {
        let req = request(
            Some("10.0.0.1:51000"),
            &[("x-forwarded-for", "203.0.113.9, 10.0.0.1")],
        );
        assert_eq!(client_key(&req, true), "203.0.113.9");
    }

    #[test]
    fn test_real_ip_fallback_behind_proxy() {
        let req = request(Some("10.0.0.1:51000"), &[("x-real-ip", "2001:db8::1")]);
        assert_eq!(client_key(&req, true), "2001:db8::1");
    }

    #[test]
    fn test_garbage_forwarded_header_falls_back_to_peer() {
        let req = request(Some("10.0.0.1:51000"), &[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(client_key(&req, true), "10.0.0.1");
    }

    #[test]
    fn test_missing_address_is_empty_key() {
        let req = request(None, &[]);
        assert_eq!(client_key(&req, false), "");
    }

    #[test]
    fn test_exempt_paths() {
        let st = RateLimitState::new(RateLimiter::new(1, Duration::from_secs(1)), false)
            .with_exempt_paths(["/health"]);
        assert!(st.is_exempt("/health"));
        assert!(!st.is_exempt("/health/other"));
    }
}
