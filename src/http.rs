//! JSON-over-HTTP calls with retry, shared by the embedding providers and
//! the summarizer.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

/// How the last attempt of a request failed.
#[derive(Debug)]
pub(crate) enum HttpFailure {
    /// Non-success status with the response body.
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    /// The request never got a response.
    Network(reqwest::Error),
    /// A success response whose body is not JSON.
    Decode(reqwest::Error),
}

/// Send the request built by `request`, retrying transient failures up to
/// `max_retries` times. `to_error` maps the final failure into the caller's
/// error type.
pub(crate) async fn send_with_retry<F, E>(
    max_retries: u32,
    request: F,
    to_error: impl Fn(HttpFailure) -> E,
) -> Result<serde_json::Value, E>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let failure = match request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| to_error(HttpFailure::Decode(e)));
                }
                let body = response.text().await.unwrap_or_default();
                let retryable = status.as_u16() == 429 || status.is_server_error();
                let failure = HttpFailure::Status { status, body };
                if !retryable {
                    return Err(to_error(failure));
                }
                failure
            }
            Err(e) => HttpFailure::Network(e),
        };

        if attempt >= max_retries {
            return Err(to_error(failure));
        }
        tracing::debug!(attempt, failure = ?failure, "request failed, retrying");
        attempt += 1;
    }
}
