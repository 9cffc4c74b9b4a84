use crate::error::UpstreamError;
use crate::services::pacing::{ExponentialBackoff, Pacing};
use async_trait::async_trait;
use log::{debug, warn};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Query parameters for one upstream call.
pub type Params = [(&'static str, String)];

/// The only operation the ingestion engine needs from the outside world.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError>;
}

/// API key plus optional `quotaUser` sent with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub key: String,
    pub quota_user: Option<String>,
}

/// Keys are rotated randomly per request; callers never see which one is used.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    keys: Vec<String>,
    quota_users: Vec<String>,
}

impl CredentialPool {
    pub fn new(keys: Vec<String>, quota_users: Vec<String>) -> Option<Self> {
        let keys: Vec<String> = keys.into_iter().filter(|k| !k.is_empty()).collect();
        if keys.is_empty() {
            return None;
        }
        let quota_users = quota_users.into_iter().filter(|u| !u.is_empty()).collect();
        Some(Self { keys, quota_users })
    }

    pub fn pick(&self) -> Credential {
        let mut rng = rand::thread_rng();
        Credential {
            key: self.keys.choose(&mut rng).cloned().unwrap_or_default(),
            quota_user: self.quota_users.choose(&mut rng).cloned(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: ExponentialBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: ExponentialBackoff {
                base: Duration::from_secs(1),
                max: Duration::from_secs(8),
            },
        }
    }
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    credentials: CredentialPool,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        credentials: CredentialPool,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            retry,
        })
    }

    fn build_url(&self, endpoint: &str, params: &Params) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint.trim_start_matches('/')))
            .map_err(|e| UpstreamError::Malformed(format!("invalid endpoint: {e}")))?;

        let credential = self.credentials.pick();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("key", &credential.key);
            if let Some(quota_user) = &credential.quota_user {
                query.append_pair("quotaUser", quota_user);
            }
        }
        Ok(url)
    }

    async fn fetch_once(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        let url = self.build_url(endpoint, params)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Network(e.without_url().to_string()))?;

        // Gateways answer 5xx with HTML; only a successful body must be JSON.
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => interpret_response(status, body),
            Err(e) if (200..300).contains(&status) => Err(UpstreamError::Malformed(e.to_string())),
            Err(_) => interpret_response(status, Value::Null),
        }
    }
}

/// Turns status + body into either the JSON payload or a typed error.
///
/// The Data API may report failures inside a 200 body, so the `error` object
/// is inspected regardless of the status.
pub fn interpret_response(status: u16, body: Value) -> Result<Value, UpstreamError> {
    let api_error = body.get("error").filter(|e| !e.is_null());

    if (200..300).contains(&status) && api_error.is_none() {
        return Ok(body);
    }

    let message = api_error
        .and_then(|e| e["message"].as_str())
        .map(str::to_string);
    let reason = api_error.and_then(|e| e["errors"][0]["reason"].as_str());
    let code = api_error
        .and_then(|e| e["code"].as_u64())
        .map(|c| c as u16)
        .filter(|_| (200..300).contains(&status))
        .unwrap_or(status);

    Err(UpstreamError::from_status(code, message, reason))
}

/// Repeats `attempt_once` while it fails with a retryable error and the
/// policy still has attempts left.
async fn with_retry<F, Fut>(
    policy: &RetryPolicy,
    endpoint: &str,
    mut attempt_once: F,
) -> Result<Value, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, UpstreamError>>,
{
    let mut attempt = 0;
    loop {
        debug!("GET /{endpoint} (attempt {})", attempt + 1);
        match attempt_once().await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff.delay(attempt);
                warn!("Request to /{endpoint} failed ({e}), retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        with_retry(&self.retry, endpoint, move || self.fetch_once(endpoint, params)).await
    }
}
