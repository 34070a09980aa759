//! Application error types.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use md5::{Digest, Md5};
use thiserror::Error;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Kik error: {0}")]
    Kik(#[from] kik_client::KikError),

    #[error("Store error: {0}")]
    Store(#[from] character_store::StoreError),

    #[error("Invalid command grammar: {0}")]
    Grammar(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;

/// Short id tying an apology sent to a user to the logged error.
pub fn correlation_id(epoch_seconds: i64, sender: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("{epoch_seconds}{sender}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Errors surfaced by the webhook endpoint.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid request signature")]
    InvalidSignature,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            WebhookError::InvalidSignature => (StatusCode::FORBIDDEN, "INVALID_SIGNATURE"),
            WebhookError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            WebhookError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED")
            }
            WebhookError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if let WebhookError::RateLimitExceeded { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(e: serde_json::Error) -> Self {
        WebhookError::BadRequest(format!("Invalid payload: {}", e))
    }
}

impl From<AppError> for WebhookError {
    fn from(e: AppError) -> Self {
        WebhookError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_is_stable() {
        let a = correlation_id(1_500_000_000, "alice");
        let b = correlation_id(1_500_000_000, "alice");
        let c = correlation_id(1_500_000_001, "alice");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, "b507615c86c37d249cb516be0f6e5cd0");
    }

    #[test]
    fn test_webhook_error_status() {
        let response = WebhookError::InvalidSignature.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = WebhookError::BadRequest("x".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = WebhookError::RateLimitExceeded { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
