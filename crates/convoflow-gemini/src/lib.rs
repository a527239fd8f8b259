// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini completion adapter for the Convoflow relay agent.
//!
//! Implements [`CompletionAdapter`] on top of the `generateContent`
//! endpoint. The rendered memory block and the user's utterance travel as
//! one user turn; the system prompt travels as the system instruction.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use convoflow_config::model::CompletionConfig;
use convoflow_core::traits::{CompletionAdapter, PluginAdapter};
use convoflow_core::types::{AdapterType, CompletionRequest, HealthStatus};
use convoflow_core::ConvoflowError;
use tracing::{debug, info, warn};

use crate::client::GeminiClient;
use crate::types::{Content, GenerateContentRequest, GenerationConfig, Part};

/// Completion adapter for the Gemini API.
pub struct GeminiCompletion {
    client: GeminiClient,
    max_output_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl GeminiCompletion {
    /// Creates the adapter from config and a resolved API key.
    pub fn new(config: &CompletionConfig, api_key: &str) -> Result<Self, ConvoflowError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = GeminiClient::new(api_key, &config.base_url, config.model.clone(), timeout)?;

        info!(model = config.model.as_str(), "Gemini completion adapter initialized");

        Ok(Self {
            client,
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            timeout,
        })
    }

    /// Converts a [`CompletionRequest`] into a `generateContent` body.
    fn to_api_request(&self, request: &CompletionRequest) -> GenerateContentRequest {
        let system_instruction = if request.system_prompt.trim().is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part {
                    text: request.system_prompt.clone(),
                }],
            })
        };

        let mut parts = Vec::with_capacity(2);
        if !request.context_text.trim().is_empty() {
            parts.push(Part {
                text: request.context_text.clone(),
            });
        }
        parts.push(Part {
            text: request.user_text.clone(),
        });

        GenerateContentRequest {
            system_instruction,
            contents: vec![Content {
                role: Some("user".into()),
                parts,
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl PluginAdapter for GeminiCompletion {
    fn name(&self) -> &str {
        "gemini"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, ConvoflowError> {
        match tokio::time::timeout(self.timeout, self.client.fetch_model()).await {
            Ok(Ok(status)) if status.is_success() => Ok(HealthStatus::Healthy),
            Ok(Ok(status)) => Ok(HealthStatus::Degraded(format!(
                "model {} returned {status}",
                self.client.model()
            ))),
            Ok(Err(e)) => Ok(HealthStatus::Unhealthy(e.to_string())),
            Err(_) => Ok(HealthStatus::Unhealthy(format!(
                "model lookup timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), ConvoflowError> {
        debug!("Gemini completion adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for GeminiCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ConvoflowError> {
        let api_request = self.to_api_request(&request);
        let response = tokio::time::timeout(self.timeout, self.client.generate(&api_request))
            .await
            .map_err(|_| ConvoflowError::Timeout {
                duration: self.timeout,
            })??;

        if let Some(reason) = response.block_reason() {
            warn!(reason = reason.as_str(), "completion refused");
            return Err(ConvoflowError::completion(format!(
                "completion refused: {reason}"
            )));
        }

        let text = response.text();
        if text.is_empty() {
            return Err(ConvoflowError::completion("completion returned no text"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    fn adapter(base_url: &str, timeout_secs: u64) -> GeminiCompletion {
        let config = CompletionConfig {
            api_key: None,
            base_url: base_url.to_string(),
            model: "gemini-2.0-flash".into(),
            max_output_tokens: 256,
            temperature: 0.5,
            timeout_secs,
        };
        GeminiCompletion::new(&config, "g-test").unwrap()
    }

    fn request(context: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are a friendly assistant.".into(),
            context_text: context.into(),
            user_text: "What should I cook tonight?".into(),
        }
    }

    #[test]
    fn empty_context_sends_single_part() {
        let api = adapter("http://localhost", 5).to_api_request(&request(""));
        assert_eq!(api.contents.len(), 1);
        assert_eq!(api.contents[0].parts.len(), 1);
        assert_eq!(api.contents[0].parts[0].text, "What should I cook tonight?");
        assert!(api.system_instruction.is_some());
    }

    #[test]
    fn memory_context_precedes_utterance() {
        let context = "## What you remember about this user\n- Is vegetarian";
        let api = adapter("http://localhost", 5).to_api_request(&request(context));
        let parts = &api.contents[0].parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text, context);
        assert_eq!(parts[1].text, "What should I cook tonight?");
    }

    #[tokio::test]
    async fn complete_sends_generation_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_json(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "You are a friendly assistant."}]},
                "contents": [{"role": "user", "parts": [{"text": "What should I cook tonight?"}]}],
                "generationConfig": {"maxOutputTokens": 256, "temperature": 0.5}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "Try a mushroom risotto."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = adapter(&server.uri(), 5).complete(request("")).await.unwrap();
        assert_eq!(reply, "Try a mushroom risotto.");
    }

    #[tokio::test]
    async fn blocked_prompt_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = adapter(&server.uri(), 5).complete(request("")).await.unwrap_err();
        assert!(matches!(err, ConvoflowError::CompletionService { .. }));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn empty_candidates_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let err = adapter(&server.uri(), 5).complete(request("")).await.unwrap_err();
        assert!(err.to_string().contains("no text"), "got: {err}");
    }

    #[tokio::test]
    async fn slow_completion_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"candidates": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = adapter(&server.uri(), 1).complete(request("")).await.unwrap_err();
        assert!(
            matches!(err, ConvoflowError::Timeout { .. } | ConvoflowError::CompletionService { .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn health_check_fetches_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models/gemini-2.0-flash"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "models/gemini-2.0-flash"
            })))
            .mount(&server)
            .await;

        let status = adapter(&server.uri(), 5).health_check().await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);
    }
}
