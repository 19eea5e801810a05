//! Per-client rate limiting.
//!
//! One governor limiter per client IP, stored in a `DashMap`. The quota
//! replenishes `max_requests` cells evenly over the window and allows the
//! whole allowance as a burst.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use tracing::warn;

use crate::config::ApiConfig;
use crate::error::ApiError;

type DirectRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>;

/// Shared rate-limit state, cheap to clone into the middleware.
#[derive(Clone)]
pub struct RateLimitState {
    enabled: bool,
    max_requests: u32,
    quota: Quota,
    limiters: Arc<DashMap<IpAddr, Arc<DirectRateLimiter>>>,
}

impl RateLimitState {
    pub fn new(config: &ApiConfig) -> Self {
        Self::with_limits(
            config.rate_limit_enabled,
            config.rate_limit_max_requests,
            config.rate_limit_window,
        )
    }

    pub fn with_limits(enabled: bool, max_requests: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let period = (window / burst.get()).max(Duration::from_nanos(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            enabled,
            max_requests: burst.get(),
            quota,
            limiters: Arc::new(DashMap::new()),
        }
    }

    fn limiter_for(&self, ip: IpAddr) -> Arc<DirectRateLimiter> {
        self.limiters
            .entry(ip)
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
            .clone()
    }

    /// Number of distinct clients seen.
    pub fn tracked_clients(&self) -> usize {
        self.limiters.len()
    }
}

/// Returned when a client has exhausted its allowance.
#[derive(Debug)]
pub struct RateLimitError {
    /// Seconds until the next request would be accepted
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut response = ApiError::too_many_requests(Some(self.retry_after)).into_response();
        response.headers_mut().insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from(self.retry_after),
        );
        response
    }
}

/// Client IP from proxy headers, then the socket address.
fn client_ip(request: &Request) -> IpAddr {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
    };

    if let Some(ip) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok())
    {
        return ip;
    }
    if let Some(ip) = header("x-real-ip").and_then(|v| v.trim().parse().ok()) {
        return ip;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Reject clients over their quota with 429 and `Retry-After`.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.enabled {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(&request);
    match state.limiter_for(ip).check() {
        Ok(()) => {
            let mut response = next.run(request).await;
            response.headers_mut().insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(state.max_requests),
            );
            Ok(response)
        }
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                .as_secs()
                .max(1);
            warn!(client_ip = %ip, retry_after, "Rate limit exceeded");
            Err(RateLimitError { retry_after })
        }
    }
}
