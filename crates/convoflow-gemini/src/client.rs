// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini Generative Language API.
//!
//! Provides [`GeminiClient`] which handles request construction,
//! authentication, and transient error retry.

use std::time::Duration;

use convoflow_core::ConvoflowError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse};

/// HTTP client for Gemini API communication.
///
/// Manages the API key header, connection pooling, and a single retry
/// for transient errors (429, 500, 503).
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    max_retries: u32,
    retry_delay: Duration,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new Gemini API client.
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key, sent as `x-goog-api-key`
    /// * `base_url` - API root, e.g. `https://generativelanguage.googleapis.com`
    /// * `model` - Model identifier
    /// * `timeout` - Bound on each HTTP request
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ConvoflowError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key).map_err(|e| {
                ConvoflowError::Config(format!("invalid Gemini API key header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ConvoflowError::CompletionService {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model,
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Shortens the delay between retries (for testing with wiremock).
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model)
    }

    /// Sends a non-streaming generate request and returns the full response.
    ///
    /// On transient errors (429, 500, 503), retries once after a delay.
    pub async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ConvoflowError> {
        let url = self.generate_url();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&url)
                .json(request)
                .send()
                .await
                .map_err(|e| ConvoflowError::CompletionService {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| ConvoflowError::CompletionService {
                        message: format!("failed to read response body: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return serde_json::from_str(&body).map_err(|e| {
                    ConvoflowError::CompletionService {
                        message: format!("failed to parse API response: {e}"),
                        source: Some(Box::new(e)),
                    }
                });
            }

            let body = response.text().await.unwrap_or_default();
            let error_msg = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "Gemini API error ({} {}): {}",
                    api_err.error.code, api_err.error.status, api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };

            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, "transient error, will retry");
                last_error = Some(ConvoflowError::completion(error_msg));
                continue;
            }

            return Err(ConvoflowError::completion(error_msg));
        }

        Err(last_error
            .unwrap_or_else(|| ConvoflowError::completion("completion request failed after retries")))
    }

    /// Fetches model metadata; used as a token-free health check.
    pub async fn fetch_model(&self) -> Result<reqwest::StatusCode, ConvoflowError> {
        let response = self
            .client
            .get(self.model_url())
            .send()
            .await
            .map_err(|e| ConvoflowError::CompletionService {
                message: format!("model lookup failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(response.status())
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, GenerationConfig, Part};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    fn test_client(base_url: &str) -> GeminiClient {
        GeminiClient::new(
            "test-api-key",
            base_url,
            "gemini-2.0-flash".into(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_retry_delay(Duration::from_millis(10))
    }

    fn test_request() -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: "Hello".into(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 64,
                temperature: 0.7,
            },
        }
    }

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn generate_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Hi there!")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.generate(&test_request()).await.unwrap();
        assert_eq!(result.text(), "Hi there!");
    }

    #[tokio::test]
    async fn generate_retries_on_429() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("After retry")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.generate(&test_request()).await.unwrap();
        assert_eq!(result.text(), "After retry");
    }

    #[tokio::test]
    async fn generate_fails_on_400() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "Bad model", "status": "INVALID_ARGUMENT"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.generate(&test_request()).await.unwrap_err().to_string();
        assert!(err.contains("INVALID_ARGUMENT"), "got: {err}");
    }

    #[tokio::test]
    async fn generate_exhausts_retries_on_503() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"code": 503, "message": "overloaded", "status": "UNAVAILABLE"}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.generate(&test_request()).await.unwrap_err().to_string();
        assert!(err.contains("UNAVAILABLE"), "got: {err}");
    }

    #[tokio::test]
    async fn client_sends_api_key_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-api-key"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("ok")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.generate(&test_request()).await;
        assert!(result.is_ok(), "headers should match: {result:?}");
    }
}
