//! Error types for remote services.

use thiserror::Error;

/// Errors produced by geocoders and dataset downloads.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The service could not be reached or answered with an unexpected status.
    #[error("network error: {0}")]
    Network(String),

    /// The provider refused the request (quota, key, rate limit).
    #[error("provider refused the request: {0}")]
    Provider(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid {name} '{value}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("unexpected response from {service}: {reason}")]
    BadResponse { service: &'static str, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] geodeck_core::Error),
}

impl RemoteError {
    /// Classify a non-success HTTP status.
    ///
    /// 401, 403 and 429 mean the provider refused us; 404 means the
    /// resource does not exist; anything else is a network failure.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            401 | 403 => RemoteError::Provider(format!("HTTP {} (check the API key) from {}", status, url)),
            429 => RemoteError::Provider(format!("HTTP 429 (rate limited) from {}", url)),
            404 => RemoteError::NotFound(url.to_string()),
            _ => RemoteError::Network(format!("HTTP {} from {}", status, url)),
        }
    }
}

/// Result alias for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
