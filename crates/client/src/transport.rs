//! HTTP transport for the remote API.
//!
//! Every operation is a GET against the single API endpoint, selected by the
//! `op` query parameter and authenticated by `key`. The transport only moves
//! bytes; status interpretation and caching live in [`crate::PullClient`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use url::Url;

use legisync_core::AppConfig;

use crate::PullError;

/// Fetches one API response body for a query string.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, query: &[(&'static str, String)]) -> Result<Bytes, PullError>;
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// API endpoint (default: https://api.legiscan.com/).
    pub base_url: String,
    /// Request timeout (default: 20s).
    pub timeout: Duration,
    /// User-agent string (default: legisync/0.x).
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let config = AppConfig::default();
        let timeout = config.timeout();
        Self { base_url: config.api_url, timeout, user_agent: config.user_agent }
    }
}

impl From<&AppConfig> for HttpConfig {
    fn from(config: &AppConfig) -> Self {
        Self { base_url: config.api_url.clone(), timeout: config.timeout(), user_agent: config.user_agent.clone() }
    }
}

/// `reqwest` transport with rustls and response decompression.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, PullError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| PullError::InvalidUrl(format!("{}: {e}", config.base_url)))?;

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, query: &[(&'static str, String)]) -> Result<Bytes, PullError> {
        let start = Instant::now();
        let op = query.iter().find(|(k, _)| *k == "op").map(|(_, v)| v.as_str()).unwrap_or("");

        let response = self
            .http
            .get(self.base_url.clone())
            .header(header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(op, status = status.as_u16(), "API request failed");
            return Err(PullError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        tracing::debug!(op, bytes = bytes.len(), elapsed_ms = start.elapsed().as_millis() as u64, "API response");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_from_app_config() {
        let app = AppConfig { timeout_ms: 5000, user_agent: "test/1".into(), ..Default::default() };
        let config = HttpConfig::from(&app);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test/1");
        assert_eq!(config.base_url, "https://api.legiscan.com/");
    }

    #[test]
    fn test_http_config_default_uses_app_defaults() {
        let app = AppConfig::default();
        let config = HttpConfig::default();
        assert_eq!(config.base_url, app.api_url);
        assert_eq!(config.timeout, app.timeout());
        assert_eq!(config.user_agent, app.user_agent);
    }

    #[test]
    fn test_invalid_base_url() {
        let config = HttpConfig { base_url: "not a url".into(), ..Default::default() };
        assert!(matches!(HttpTransport::new(config), Err(PullError::InvalidUrl(_))));
    }

    #[test]
    fn test_transport_builds() {
        assert!(HttpTransport::new(HttpConfig::default()).is_ok());
    }
}
