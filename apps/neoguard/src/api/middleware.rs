//! # Request Throttling
//!
//! One token bucket shared by every dashboard route. The dashboard polls
//! `/summary` and `/records` on a timer, so the limit is global rather than
//! keyed by client. Rejected requests get the same JSON error shape as the
//! handlers plus a `Retry-After` header.

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Global token bucket for the API.
pub struct Throttle {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    per_second: NonZeroU32,
}

impl Throttle {
    /// A bucket refilled at `requests_per_second`, or `None` when throttling
    /// is switched off (`0`).
    #[must_use]
    pub fn per_second(requests_per_second: u32) -> Option<Arc<Self>> {
        let per_second = NonZeroU32::new(requests_per_second)?;
        Some(Arc::new(Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            per_second,
        }))
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.per_second.get()
    }

    /// Take one token, or return how long until the next one is available.
    pub fn acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.limiter.clock().now()))
    }
}

/// Whole seconds a client should wait, never less than one.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Reject requests over the global limit with 429 and `Retry-After`.
pub async fn throttle_middleware(
    State(throttle): State<Arc<Throttle>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match throttle.acquire() {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_after = retry_after_secs(wait);
            tracing::warn!(
                path = %request.uri().path(),
                limit = throttle.limit(),
                retry_after,
                "Request throttled"
            );

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse::new("rate limit exceeded")),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}
