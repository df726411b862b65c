//! Endpoint description summarization.
//!
//! Descriptions in large specifications are often long HTML documents. A
//! [`Summarizer`] turns one into a short plain-text summary that embeds
//! better. The driver treats the summarizer as optional: with none
//! configured, the raw description is used as-is.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::SummarizerConfig;
use crate::error::SummarizeError;
use crate::http::{self, HttpFailure};

/// Prompt sent ahead of the raw description.
pub const SUMMARY_PROMPT: &str = "Summarise the following OpenAPI endpoint description (written in html) in plain text with less than 2000 characters:\n\n";

/// Text in, text out.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

/// Summarizer backed by the OpenAI chat completions API.
pub struct OpenAISummarizer {
    model: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAISummarizer {
    /// # Errors
    ///
    /// Returns [`SummarizeError::Config`] if `OPENAI_API_KEY` is not set.
    pub fn new(config: &SummarizerConfig) -> Result<Self, SummarizeError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            SummarizeError::Config("OPENAI_API_KEY environment variable not set".into())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SummarizeError::Config(e.to_string()))?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Summarizer for OpenAISummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "user", "content": format!("{}{}", SUMMARY_PROMPT, text)}
            ],
        });

        let request = || {
            self.client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        };
        let json = http::send_with_retry(self.max_retries, request, summarize_error).await?;
        parse_chat_response(&json)
    }
}

fn summarize_error(failure: HttpFailure) -> SummarizeError {
    match failure {
        HttpFailure::Status { status, body } => SummarizeError::Api {
            status: status.as_u16(),
            body,
        },
        HttpFailure::Network(e) => SummarizeError::Request(e.to_string()),
        HttpFailure::Decode(e) => SummarizeError::Parse(e.to_string()),
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, SummarizeError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| SummarizeError::Parse("missing choices[0].message.content".into()))
}

/// Build the summarizer named in config, or `None` when disabled.
pub fn create_summarizer(
    config: &SummarizerConfig,
) -> Result<Option<Box<dyn Summarizer>>, SummarizeError> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => Ok(Some(Box::new(OpenAISummarizer::new(config)?))),
        other => Err(SummarizeError::Config(format!(
            "unknown summarizer provider: {}",
            other
        ))),
    }
}
