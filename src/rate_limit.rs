//! Rate limiting for one-time-code confirmation and newsletter signup.
//!
//! Uses a token bucket algorithm with per-IP tracking.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const OTP_VERIFY_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
const OTP_VERIFY_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const NEWSLETTER_PER_MIN: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// Rate limiting configuration.
pub struct RateLimitConfig {
    /// Per-IP limiter for one-time-code confirmation (5 burst, then 1 per second)
    pub otp_verify: IpLimiter,
    /// Per-IP limiter for newsletter signup (3 per minute)
    pub newsletter: IpLimiter,
    /// Header carrying the client IP when running behind a proxy
    ip_header: Option<String>,
}

impl RateLimitConfig {
    pub fn new(ip_header: Option<String>) -> Self {
        Self::with_quotas(
            ip_header,
            Quota::per_second(OTP_VERIFY_PER_SEC).allow_burst(OTP_VERIFY_BURST),
            Quota::per_minute(NEWSLETTER_PER_MIN),
        )
    }

    pub fn with_quotas(ip_header: Option<String>, otp_verify: Quota, newsletter: Quota) -> Self {
        Self {
            otp_verify: RateLimiter::keyed(otp_verify),
            newsletter: RateLimiter::keyed(newsletter),
            ip_header,
        }
    }

    fn check(&self, limiter: &IpLimiter, request: &Request) -> Result<(), Response> {
        let ip = extract_client_ip(request, self.ip_header.as_deref()).map_err(|e| {
            warn!("Rate limiter could not determine client IP: {}", e);
            (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response()
        })?;

        limiter.check_key(&ip).map_err(|_| {
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
            )
                .into_response()
        })
    }
}

/// Middleware for rate limiting one-time-code confirmation.
pub async fn rate_limit_otp_verify(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match config.check(&config.otp_verify, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting newsletter signup.
pub async fn rate_limit_newsletter(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match config.check(&config.newsletter, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}
