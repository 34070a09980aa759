//! Webhook throttling and access logging.

use crate::error::WebhookError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Kik names the addressed bot in this header on every webhook call.
pub const KIK_USERNAME_HEADER: &str = "x-kik-username";

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Caps how many webhook batches per minute reach the dispatcher.
///
/// Kik delivers all chats through one endpoint, so the quota is global.
#[derive(Clone)]
pub struct WebhookThrottle {
    limiter: Arc<DirectLimiter>,
}

impl WebhookThrottle {
    /// `batches_per_minute` of zero means the configured default of 600.
    pub fn per_minute(batches_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(batches_per_minute)
            .or(NonZeroU32::new(crate::config::DEFAULT_RATE_LIMIT_PER_MINUTE))
            .unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    /// High enough that tests never hit it.
    pub fn permissive() -> Self {
        Self::per_minute(u32::MAX)
    }

    /// Take one slot, or report how long until the next one frees up.
    pub fn admit(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.limiter.clock().now()))
    }
}

/// Rejects `/incoming` with 429 and a `Retry-After` once the quota is spent.
pub async fn throttle_webhook(
    State(throttle): State<WebhookThrottle>,
    request: Request,
    next: Next,
) -> Result<Response, WebhookError> {
    if let Err(wait) = throttle.admit() {
        let retry_after_secs = wait.as_secs().max(1);
        warn!(retry_after_secs, "Webhook quota spent, asking Kik to retry later");
        return Err(WebhookError::RateLimitExceeded { retry_after_secs });
    }
    Ok(next.run(request).await)
}

/// One line per request; health checks only at trace level.
pub async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let bot = request
        .headers()
        .get(KIK_USERNAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        error!(%method, %path, %status, bot = %bot, elapsed_ms, "Request failed");
    } else if status.is_client_error() {
        warn!(%method, %path, %status, bot = %bot, elapsed_ms, "Request rejected");
    } else if path == "/health" {
        trace!(%status, elapsed_ms, "Health check");
    } else {
        debug!(%method, %path, %status, bot = %bot, elapsed_ms, "Request handled");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spent_quota_reports_wait() {
        let throttle = WebhookThrottle::per_minute(1);
        assert!(throttle.admit().is_ok());

        let wait = throttle.admit().unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(60));
    }

    #[test]
    fn test_zero_quota_uses_default() {
        let throttle = WebhookThrottle::per_minute(0);
        for _ in 0..100 {
            assert!(throttle.admit().is_ok());
        }
    }

    #[test]
    fn test_clones_share_one_quota() {
        let throttle = WebhookThrottle::per_minute(2);
        let other = throttle.clone();
        assert!(throttle.admit().is_ok());
        assert!(other.admit().is_ok());
        assert!(throttle.admit().is_err());
    }
}
