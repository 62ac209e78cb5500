//! OpenAI-compatible HTTP plumbing shared by the chat and embedding clients
//!
//! Failure classification lives here: connection problems, timeouts,
//! throttling and 5xx responses are transient and retried; authentication,
//! quota and request errors are fatal.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::embedding::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::generation::retry::{with_retry, Failure, RetryPolicy};

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Bearer-authenticated JSON client with retry
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl OpenAiClient {
    /// Create a client for `base_url` (without trailing endpoint path)
    pub fn new(base_url: &str, api_key: &str, timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POST JSON to `{base_url}{path}`, retrying transient failures.
    /// Returns the decoded body and the attempts used.
    pub async fn post_json<B, R>(&self, path: &str, body: &B, label: &str) -> Result<(R, u32)>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        self.post_json_map(path, body, label, Ok).await
    }

    /// Like [`post_json`](Self::post_json), but `map` runs inside the retry
    /// loop so a decoded-but-unusable body can be rejected as transient.
    pub async fn post_json_map<B, R, T, F>(&self, path: &str, body: &B, label: &str, map: F) -> Result<(T, u32)>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
        F: Fn(R) -> Result<T>,
    {
        let url = format!("{}{}", self.base_url, path);
        let url = &url;
        let map = &map;
        with_retry(&self.policy, label, move |_| async move {
            let decoded = self.post_once::<B, R>(url, body).await?;
            map(decoded).map_err(Failure::from)
        })
        .await
    }

    async fn post_once<B, R>(&self, url: &str, body: &B) -> std::result::Result<R, Failure>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(Error::from)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Failure {
                error: classify_status(status, &body),
                retry_after,
            });
        }

        let bytes = response.bytes().await.map_err(Error::from)?;
        serde_json::from_slice::<R>(&bytes)
            .map_err(|e| Failure::from(Error::transient(format!("Malformed response from {}: {}", url, e))))
    }

    /// GET `{base_url}/models` as a liveness check
    pub async fn is_reachable(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.http.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Map a non-success HTTP response onto the error taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
    let code = detail
        .as_ref()
        .and_then(|d| d.code.as_ref())
        .map(|c| c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string()))
        .unwrap_or_default();
    let kind = detail.as_ref().and_then(|d| d.kind.clone()).unwrap_or_default();
    let message = detail
        .and_then(|d| d.message)
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect());

    let quota = code == "insufficient_quota" || kind == "insufficient_quota";
    let text = format!("HTTP {}: {}", status.as_u16(), message.trim());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::fatal(format!("authentication failed ({})", text)),
        StatusCode::PAYMENT_REQUIRED => Error::fatal(format!("quota exhausted ({})", text)),
        StatusCode::TOO_MANY_REQUESTS if quota => Error::fatal(format!("quota exhausted ({})", text)),
        StatusCode::TOO_MANY_REQUESTS => Error::transient(format!("rate limited ({})", text)),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Error::transient(text),
        _ => Error::fatal(text),
    }
}

/// `Retry-After` in delta-seconds form
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    name: String,
    model: String,
    dimensions: usize,
    /// Requested output size; only the `text-embedding-3` family accepts one
    requested_dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Create a new embedder
    pub fn new(config: &EmbeddingConfig, timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let requested_dimensions = supports_dimensions(&config.model).then_some(config.dimensions);
        if requested_dimensions.is_none() {
            tracing::warn!(
                "Model {} has a fixed output size; EMBEDDING_DIMENSIONS={} is not sent",
                config.model,
                config.dimensions
            );
        }
        Ok(Self {
            client: OpenAiClient::new(&config.base_url, &config.api_key, timeout, policy)?,
            name: format!("openai-compatible:{}", config.model),
            model: config.model.clone(),
            dimensions: config.dimensions,
            requested_dimensions,
            batch_size: config.batch_size.max(1),
        })
    }

    fn request<'a>(&'a self, input: &'a [String]) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.model,
            input,
            dimensions: self.requested_dimensions,
        }
    }
}

/// Models that can shorten their vectors on request
fn supports_dimensions(model: &str) -> bool {
    model.starts_with("text-embedding-3")
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::transient("Embedding response contained no vectors"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let request = self.request(batch);
            let (mut response, _attempts): (EmbeddingResponse, u32) =
                self.client.post_json("/embeddings", &request, "embedding request").await?;

            if response.data.len() != batch.len() {
                return Err(Error::transient(format!(
                    "Embedding response has {} vectors for {} inputs",
                    response.data.len(),
                    batch.len()
                )));
            }
            response.data.sort_by_key(|d| d.index);
            out.extend(response.data.into_iter().map(|d| d.embedding));
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.client.is_reachable().await)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(matches!(classify_status(StatusCode::UNAUTHORIZED, ""), Error::GatewayFatal(_)));
        assert!(matches!(classify_status(StatusCode::PAYMENT_REQUIRED, ""), Error::GatewayFatal(_)));
        assert!(matches!(classify_status(StatusCode::BAD_REQUEST, ""), Error::GatewayFatal(_)));
    }

    #[test]
    fn test_quota_429_is_fatal() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, Error::GatewayFatal(ref m) if m.contains("quota")));
    }

    #[test]
    fn test_error_message_extracted() {
        let body = r#"{"error":{"message":"Authentication Fails","type":"authentication_error"}}"#;
        let err = classify_status(StatusCode::UNAUTHORIZED, body);
        assert!(err.to_string().contains("Authentication Fails"));
    }

    #[test]
    fn test_dimensions_sent_only_when_supported() {
        let input = vec!["text".to_string()];
        let config = EmbeddingConfig {
            api_key: "k".into(),
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAiEmbedder::new(&config, Duration::from_secs(5), RetryPolicy::default()).unwrap();
        let body = serde_json::to_value(embedder.request(&input)).unwrap();
        assert_eq!(body["dimensions"], 256);
        assert_eq!(embedder.name(), "openai-compatible:text-embedding-3-small");

        let legacy = EmbeddingConfig {
            model: "text-embedding-ada-002".into(),
            ..config
        };
        let embedder = OpenAiEmbedder::new(&legacy, Duration::from_secs(5), RetryPolicy::default()).unwrap();
        let body = serde_json::to_value(embedder.request(&input)).unwrap();
        assert!(body.get("dimensions").is_none());
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "2".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }
}
