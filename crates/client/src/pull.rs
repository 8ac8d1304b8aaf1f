//! Cached, rate-limited access to the remote API.
//!
//! ### Request flow
//!
//! - **Cache**: responses are read from the ephemeral response cache while
//!   younger than the operation's TTL. Operations with a TTL of 0 always go
//!   to the network and are never written.
//! - **Rate limiting**: consecutive network requests are spaced by a minimum
//!   interval.
//! - **Status**: a response whose `status` is not `OK` fails with
//!   [`PullError::Api`] carrying `alert.message`, and is not cached.
//! - **Cache writes**: a successful response that cannot be written to the
//!   cache fails the request, so a missing entry is never mistaken for a
//!   cached one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use legisync_core::cache::ApiOperation;
use legisync_core::model::STATUS_OK;
use legisync_core::{AppConfig, FileCache, Payload};

use crate::PullError;
use crate::transport::{HttpConfig, HttpTransport, Transport};

/// Minimum interval between network requests.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(Instant::now().checked_sub(min_interval).unwrap_or_else(Instant::now)),
            min_interval,
        }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

/// Remote API client backed by the response cache.
#[derive(Clone)]
pub struct PullClient {
    transport: Arc<dyn Transport>,
    cache: FileCache,
    api_key: String,
    rate_limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for PullClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullClient").field("cache", &self.cache).finish_non_exhaustive()
    }
}

impl PullClient {
    /// Create a client over any transport.
    pub fn new(transport: Arc<dyn Transport>, cache: FileCache, api_key: impl Into<String>) -> Result<Self, PullError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(PullError::MissingApiKey);
        }
        Ok(Self { transport, cache, api_key, rate_limiter: Arc::new(RateLimiter::new(MIN_REQUEST_INTERVAL)) })
    }

    /// HTTP client with the configured response cache.
    ///
    /// # Errors
    ///
    /// Fails without an API key, with an unparseable API URL, or when the
    /// response cache directory is unusable.
    pub fn from_config(config: &AppConfig) -> Result<Self, PullError> {
        let api_key = config.require_api_key().map_err(|_| PullError::MissingApiKey)?;
        let transport = HttpTransport::new(HttpConfig::from(config))?;
        let cache = FileCache::ephemeral(&config.api_cache_dir, config.cache_lifetime_secs)?;
        Self::new(Arc::new(transport), cache, api_key)
    }

    /// Override the spacing between network requests.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::new(min_interval));
        self
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Raw response body for `op`, from cache when fresh.
    pub async fn request_bytes(&self, op: &ApiOperation) -> Result<Vec<u8>, PullError> {
        let ttl = op.ttl();
        let key = op.cache_key();

        if ttl > 0
            && let Some(bytes) = self.cache.get(&key, Some(ttl))
        {
            tracing::debug!(op = op.name(), key = %key, "response cache hit");
            return Ok(bytes);
        }
        tracing::debug!(op = op.name(), key = %key, "response cache miss");

        self.rate_limiter.acquire().await;

        let mut query = vec![("key", self.api_key.clone()), ("op", op.name().to_string())];
        query.extend(op.params());
        let bytes = self.transport.get(&query).await?;

        let value: Value = serde_json::from_slice(&bytes).map_err(|e| PullError::Parse(e.to_string()))?;
        check_api_status(&value)?;

        if ttl > 0 {
            self.cache.set(&key, &bytes)?;
        }

        Ok(bytes.to_vec())
    }

    /// Response for `op` as JSON, for operations without a reconcilable payload.
    pub async fn request_json(&self, op: &ApiOperation) -> Result<Value, PullError> {
        let bytes = self.request_bytes(op).await?;
        serde_json::from_slice(&bytes).map_err(|e| PullError::Parse(e.to_string()))
    }

    /// Response for `op` decoded into a [`Payload`].
    pub async fn request(&self, op: &ApiOperation) -> Result<Payload, PullError> {
        let bytes = self.request_bytes(op).await?;
        Ok(Payload::from_slice(&bytes)?)
    }
}

/// Fail with the API alert unless `status` is `OK`.
fn check_api_status(value: &Value) -> Result<(), PullError> {
    let status = value.get("status").and_then(Value::as_str).unwrap_or_default();
    if status == STATUS_OK {
        return Ok(());
    }
    let message = value
        .pointer("/alert/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("unexpected status \"{status}\""));
    Err(PullError::Api(message))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;

    use super::*;

    /// Serves canned bodies keyed by `{op}:{id}` (plus `:{page}` for paged
    /// requests) and records every query.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        responses: StdMutex<HashMap<String, Vec<u8>>>,
        calls: StdMutex<Vec<String>>,
        queries: StdMutex<Vec<Vec<(String, String)>>>,
    }

    impl FakeTransport {
        pub(crate) fn respond(&self, key: &str, body: Value) {
            let bytes = serde_json::to_vec(&body).unwrap();
            self.responses.lock().unwrap().insert(key.to_string(), bytes);
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Parameters of the most recent request, `key` excluded.
        pub(crate) fn last_query(&self) -> Vec<(String, String)> {
            self.queries.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get(&self, query: &[(&'static str, String)]) -> Result<Bytes, PullError> {
            let param = |name: &str| query.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone()).unwrap_or_default();
            assert_eq!(param("key"), "test-key");

            let mut key = format!("{}:{}", param("op"), param("id"));
            let page = param("page");
            if !page.is_empty() {
                key = format!("{key}:{page}");
            }
            self.calls.lock().unwrap().push(key.clone());
            self.queries.lock().unwrap().push(
                query
                    .iter()
                    .filter(|(k, _)| *k != "key")
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            );
            match self.responses.lock().unwrap().get(&key) {
                Some(body) => Ok(Bytes::from(body.clone())),
                None => Err(PullError::HttpError { status: 404 }),
            }
        }
    }

    pub(crate) fn client(transport: Arc<FakeTransport>, dir: &std::path::Path) -> PullClient {
        let cache = FileCache::ephemeral(dir, 3600).unwrap();
        PullClient::new(transport, cache, "test-key").unwrap().with_min_interval(Duration::ZERO)
    }

    fn person(id: i64) -> Value {
        json!({"status": "OK", "person": {"people_id": id, "person_hash": "p", "state_id": 5, "name": "Member"}})
    }

    #[tokio::test]
    async fn test_response_cached_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.respond("getPerson:7", person(7));
        let client = client(transport.clone(), dir.path());

        let op = ApiOperation::Person { id: 7 };
        assert!(matches!(client.request(&op).await.unwrap(), Payload::Person(_)));
        assert!(matches!(client.request(&op).await.unwrap(), Payload::Person(_)));

        assert_eq!(transport.calls(), vec!["getPerson:7"]);
        assert!(dir.path().join("people/7.json").exists());
    }

    #[tokio::test]
    async fn test_error_status_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.respond("getBill:1", json!({"status": "ERROR", "alert": {"message": "Unknown bill id"}}));
        let client = client(transport.clone(), dir.path());

        let op = ApiOperation::Bill { id: 1 };
        let err = client.request(&op).await.unwrap_err();
        assert!(matches!(err, PullError::Api(ref message) if message == "Unknown bill id"));
        assert!(client.request(&op).await.is_err());

        assert_eq!(transport.calls().len(), 2);
        assert!(!dir.path().join("bill/1.json").exists());
    }

    #[tokio::test]
    async fn test_zero_ttl_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.respond("getMonitorListRaw:", json!({"status": "OK", "monitorlist": []}));
        let client = client(transport.clone(), dir.path());

        let op = ApiOperation::MonitorList { record: "current".into(), raw: true };
        client.request_json(&op).await.unwrap();
        client.request_json(&op).await.unwrap();

        assert_eq!(transport.calls().len(), 2);
        assert!(!dir.path().join(op.cache_key()).exists());
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("people"), b"not a directory").unwrap();
        let transport = Arc::new(FakeTransport::default());
        transport.respond("getPerson:7", person(7));
        let client = client(transport.clone(), dir.path());

        let err = client.request(&ApiOperation::Person { id: 7 }).await.unwrap_err();
        assert!(matches!(err, PullError::Core(legisync_core::Error::CacheWrite { .. })));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        struct Garbage;

        #[async_trait]
        impl Transport for Garbage {
            async fn get(&self, _query: &[(&'static str, String)]) -> Result<Bytes, PullError> {
                Ok(Bytes::from_static(b"<html>"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::ephemeral(dir.path(), 3600).unwrap();
        let client = PullClient::new(Arc::new(Garbage), cache, "k").unwrap();
        let err = client.request(&ApiOperation::Bill { id: 1 }).await.unwrap_err();
        assert!(matches!(err, PullError::Parse(_)));
    }

    #[test]
    fn test_new_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::ephemeral(dir.path(), 3600).unwrap();
        let result = PullClient::new(Arc::new(FakeTransport::default()), cache, "");
        assert!(matches!(result, Err(PullError::MissingApiKey)));
    }

    #[test]
    fn test_from_config_missing_key() {
        let result = PullClient::from_config(&AppConfig::default());
        assert!(matches!(result, Err(PullError::MissingApiKey)));
    }

    #[test]
    fn test_check_api_status_without_alert() {
        let err = check_api_status(&json!({"status": "FAIL"})).unwrap_err();
        assert!(err.to_string().contains("FAIL"));
        assert!(check_api_status(&json!({"status": "OK"})).is_ok());
    }
}
