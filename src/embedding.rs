//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API.
//! - **[`OllamaProvider`]**: calls a local Ollama server's `/api/embed`.
//!
//! Providers are chosen from an explicit [`EmbeddingModel`] descriptor
//! (`provider`, `name`, `dimension`), and each descriptor maps to one dense
//! vector field in the store (see [`vector_field_names`]).
//!
//! # Retry Strategy
//!
//! Both providers retry transient errors with exponential backoff through
//! the crate's shared HTTP helper: 429 and 5xx responses and network errors
//! are retried, other 4xx responses fail immediately.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingsConfig;
use crate::error::StoreError;
use crate::http::{self, HttpFailure};
use crate::models::{EmbeddingBackend, EmbeddingModel};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The descriptor this provider was built from.
    fn model(&self) -> &EmbeddingModel;

    /// Embed a batch of texts, returning one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;
}

/// Vector field name for each descriptor: `<provider>_dense`, with an index
/// suffix when the same provider is configured more than once.
pub fn vector_field_names(models: &[EmbeddingModel]) -> Vec<String> {
    models
        .iter()
        .enumerate()
        .map(|(i, model)| {
            let same_provider = models
                .iter()
                .filter(|m| m.provider == model.provider)
                .count();
            if same_provider > 1 {
                format!("{}_dense_{}", model.provider, i)
            } else {
                format!("{}_dense", model.provider)
            }
        })
        .collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    model: EmbeddingModel,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAIProvider {
    pub fn new(model: EmbeddingModel, config: &EmbeddingsConfig) -> Result<Self, StoreError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| StoreError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        Ok(Self {
            model,
            api_key,
            client: build_client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model(&self) -> &EmbeddingModel {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        let body = serde_json::json!({
            "model": self.model.name,
            "input": texts,
        });
        let request = || {
            self.client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        };
        let json = send_with_retry(&self.model, self.max_retries, request).await?;
        parse_openai_response(&self.model, &json)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays and returns them in order.
fn parse_openai_response(
    model: &EmbeddingModel,
    json: &serde_json::Value,
) -> Result<Vec<Vec<f32>>, StoreError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| embedding_error(model, "invalid response: missing data array"))?;

    data.iter()
        .map(|item| {
            item.get("embedding")
                .and_then(|e| e.as_array())
                .map(|values| to_f32(values))
                .ok_or_else(|| embedding_error(model, "invalid response: missing embedding"))
        })
        .collect()
}

// ============ Ollama Provider ============

/// Embedding provider backed by a local Ollama server.
pub struct OllamaProvider {
    model: EmbeddingModel,
    endpoint: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(model: EmbeddingModel, config: &EmbeddingsConfig) -> Result<Self, StoreError> {
        Ok(Self {
            model,
            endpoint: format!("{}/api/embed", config.ollama_url.trim_end_matches('/')),
            client: build_client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model(&self) -> &EmbeddingModel {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        let body = serde_json::json!({
            "model": self.model.name,
            "input": texts,
        });
        let request = || self.client.post(&self.endpoint).json(&body);
        let json = send_with_retry(&self.model, self.max_retries, request).await?;
        parse_ollama_response(&self.model, &json)
    }
}

fn parse_ollama_response(
    model: &EmbeddingModel,
    json: &serde_json::Value,
) -> Result<Vec<Vec<f32>>, StoreError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| embedding_error(model, "invalid response: missing embeddings"))?;

    embeddings
        .iter()
        .map(|item| {
            item.as_array()
                .map(|values| to_f32(values))
                .ok_or_else(|| embedding_error(model, "invalid response: embedding is not an array"))
        })
        .collect()
}

// ============ Shared plumbing ============

fn build_client(timeout_secs: u64) -> Result<reqwest::Client, StoreError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {}", e)))
}

fn to_f32(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

fn embedding_error(model: &EmbeddingModel, message: impl Into<String>) -> StoreError {
    StoreError::Embedding {
        model: format!("{}:{}", model.provider, model.name),
        message: message.into(),
    }
}

/// Send a JSON request, mapping the final failure to an embedding error.
async fn send_with_retry<F>(
    model: &EmbeddingModel,
    max_retries: u32,
    request: F,
) -> Result<serde_json::Value, StoreError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    http::send_with_retry(max_retries, request, |failure| match failure {
        HttpFailure::Status { status, body } => {
            embedding_error(model, format!("API error {}: {}", status, body))
        }
        HttpFailure::Network(e) | HttpFailure::Decode(e) => embedding_error(model, e.to_string()),
    })
    .await
}

/// Create the provider for one descriptor.
pub fn create_provider(
    model: &EmbeddingModel,
    config: &EmbeddingsConfig,
) -> Result<Box<dyn EmbeddingProvider>, StoreError> {
    match model.provider {
        EmbeddingBackend::Openai => Ok(Box::new(OpenAIProvider::new(model.clone(), config)?)),
        EmbeddingBackend::Ollama => Ok(Box::new(OllamaProvider::new(model.clone(), config)?)),
    }
}

/// Create providers for every configured descriptor.
pub fn create_providers(
    config: &EmbeddingsConfig,
) -> Result<Vec<Box<dyn EmbeddingProvider>>, StoreError> {
    if config.models.is_empty() {
        return Err(StoreError::Config(
            "at least one embedding model is required".into(),
        ));
    }
    config
        .models
        .iter()
        .map(|model| create_provider(model, config))
        .collect()
}
