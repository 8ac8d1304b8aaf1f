//! Pull client error types.

use std::sync::Arc;

/// Errors from fetching and reconciling remote payloads.
#[derive(Debug, thiserror::Error)]
pub enum PullError {
    /// Missing LEGISYNC_API_KEY.
    #[error("missing API key: LEGISYNC_API_KEY not set")]
    MissingApiKey,

    /// Configured API URL does not parse.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body is not JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The API answered with `status = ERROR`.
    #[error("API error: {0}")]
    Api(String),

    /// Store, cache or reconciliation failure.
    #[error(transparent)]
    Core(#[from] legisync_core::Error),
}

impl From<reqwest::Error> for PullError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { PullError::Timeout } else { PullError::Network(Arc::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PullError::MissingApiKey;
        assert!(err.to_string().contains("API key"));

        let err = PullError::Api("Unknown bill id".to_string());
        assert_eq!(err.to_string(), "API error: Unknown bill id");

        let err = PullError::HttpError { status: 503 };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: PullError = legisync_core::Error::Status("ERROR".into()).into();
        assert!(err.to_string().starts_with("STATUS_ERROR"));
    }
}
