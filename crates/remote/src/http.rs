//! HTTP client abstraction.
//!
//! Geocoders and downloaders are generic over [`AsyncHttpClient`] so tests
//! can swap in canned responses.

use crate::error::{RemoteError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// User agent sent with every request; Nominatim rejects anonymous clients.
pub const DEFAULT_USER_AGENT: &str = concat!("geodeck/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Async HTTP GET.
pub trait AsyncHttpClient: Send + Sync {
    /// Fetch `url` and return the response body.
    ///
    /// Non-success statuses are mapped through [`RemoteError::from_status`].
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// [`AsyncHttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(url = url, status = resp.status().as_u16(), "HTTP response received");
                resp
            }
            Err(e) => {
                warn!(url = url, error = %e, is_timeout = e.is_timeout(), "HTTP request failed");
                return Err(RemoteError::Network(format!("request to {} failed: {}", url, e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(RemoteError::from_status(status.as_u16(), url));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Network(format!("reading body from {} failed: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}
