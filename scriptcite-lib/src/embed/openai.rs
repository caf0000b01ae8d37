use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embed::{Embedder, Embedding};
use crate::{Error, Result};

/// Default OpenAI-compatible API base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default embedding model.
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
/// Native dimensionality of [`DEFAULT_OPENAI_MODEL`].
pub const DEFAULT_OPENAI_DIMENSION: usize = 1536;

/// Settings for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Requested output dimensionality; `None` keeps the model default.
    pub dimensions: Option<usize>,
    pub timeout: Duration,
    pub max_retries: usize,
    pub batch_size: usize,
}

impl OpenAiConfig {
    /// Defaults for `text-embedding-3-small` with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimensions: None,
            timeout: Duration::from_secs(30),
            max_retries: 5,
            batch_size: 64,
        }
    }
}

/// Async embeddings client for OpenAI-compatible endpoints.
///
/// Rate limits (429) and server errors are retried with exponential backoff;
/// anything still failing after `max_retries` attempts surfaces as
/// [`Error::Embedding`].
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::InvalidInput("missing OpenAI API key".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(Error::InvalidInput("missing OpenAI model name".to_string()));
        }
        if config.dimensions == Some(0) {
            return Err(Error::InvalidInput("embedding dimensions must be positive".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| Error::InvalidInput("invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            model: config.model,
            dimensions: config.dimensions,
            max_retries: config.max_retries.max(1),
            batch_size: config.batch_size.max(1),
        })
    }

    /// Maximum batch size configured for this client.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
                dimensions: self.dimensions,
            };
            let response = self.client.post(&self.endpoint).json(&request).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
                            Error::Embedding(format!("failed to parse embedding response: {e}"))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != inputs.len() {
                            return Err(Error::Embedding(format!(
                                "provider returned {} embeddings for {} inputs",
                                parsed.data.len(),
                                inputs.len()
                            )));
                        }
                        return Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect());
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "embedding request rejected, retrying");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(Error::Embedding(format!(
                        "embeddings request failed ({status}): {body}"
                    )));
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "embedding request failed, retrying");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(Error::Embedding(err.to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(size = batch.len(), model = %self.model, "embedding batch");
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("provider returned no embeddings".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimensions.unwrap_or(DEFAULT_OPENAI_DIMENSION)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    #[serde(borrow)]
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
