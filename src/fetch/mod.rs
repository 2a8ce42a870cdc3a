//! HTTP fetching.
//!
//! Thin JSON GET layer over reqwest. Every aggregation run is stateless,
//! so there is no response cache; each call carries its own socket timeout
//! and maps transport outcomes onto the [`FetchError`] taxonomy that the
//! aggregation pipeline matches on.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors that can occur during fetching.
///
/// The aggregator matches on these variants: `NotFound` is treated as
/// "zero entries" by callers, the rest degrade to unavailable values.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("resource not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.status() == Some(StatusCode::NOT_FOUND) {
            FetchError::NotFound
        } else if err.is_decode() {
            FetchError::MalformedResponse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Per-request socket timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: format!("liveboard/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// JSON HTTP fetcher.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("liveboard/0.1.0")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Create a fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetcherConfig::default())
    }

    /// GET a URL and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        debug!("GET {}", url);

        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown")
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_config_default() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("liveboard/"));
    }

    #[test]
    fn test_fetcher_builds_with_defaults() {
        assert!(Fetcher::with_defaults().is_ok());
    }

    #[test]
    fn test_fetcher_accepts_odd_user_agent() {
        // Header-invalid user agents fall back to a static default
        let config = FetcherConfig {
            user_agent: "bad\nagent".to_string(),
            ..Default::default()
        };
        assert!(Fetcher::new(config).is_ok());
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Timeout.to_string(), "request timed out");
        assert_eq!(FetchError::NotFound.to_string(), "resource not found");
        assert!(
            FetchError::Transport("HTTP 500: Internal Server Error".to_string())
                .to_string()
                .contains("500")
        );
    }
}
