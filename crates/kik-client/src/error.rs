//! Kik client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KikError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),
}
