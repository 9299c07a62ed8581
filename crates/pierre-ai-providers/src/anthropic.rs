// ABOUTME: Anthropic Claude messages API client for plan generation
// ABOUTME: Maps the vendor envelope and error types into the shared provider contract
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use pierre_plan_core::models::{AiProvider, AiProviderConfig};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::chat::{ChatRequest, ChatResponse, LlmCapabilities, TokenUsage};
use crate::errors::{retry_after_secs, ProviderError};
use crate::http_client::shared_client;
use crate::provider::{ClientSettings, PlanProvider};

const API_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const API_VERSION: &str = "2023-06-01";

/// Anthropic's error type for an overloaded service (HTTP 529)
const OVERLOADED_ERROR: &str = "overloaded_error";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic Claude client
pub struct AnthropicProvider {
    settings: ClientSettings,
    api_key: Zeroizing<String>,
    client: &'static Client,
}

impl AnthropicProvider {
    /// Create a client for a config
    #[must_use]
    pub fn new(config: &AiProviderConfig, api_key: Zeroizing<String>) -> Self {
        Self {
            settings: ClientSettings::resolve(config, API_BASE_URL, DEFAULT_MODEL),
            api_key,
            client: shared_client(),
        }
    }

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.settings.model)
    }

    fn build_request<'a>(&'a self, request: &'a ChatRequest) -> MessagesRequest<'a> {
        MessagesRequest {
            model: self.model_for(request),
            max_tokens: request.max_tokens.unwrap_or(self.settings.max_tokens),
            // Anthropic accepts 0..=1
            temperature: request
                .temperature
                .unwrap_or(self.settings.temperature)
                .clamp(0.0, 1.0),
            system: request.system_prompt(),
            messages: request
                .conversation()
                .map(|m| AnthropicMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        }
    }

    fn parse_error_response(
        status: StatusCode,
        retry_after: Option<u64>,
        body: &str,
    ) -> ProviderError {
        let provider = AiProvider::Anthropic.as_str();
        let detail = serde_json::from_str::<AnthropicErrorResponse>(body)
            .ok()
            .map(|r| r.error);

        if detail
            .as_ref()
            .is_some_and(|d| d.error_type == OVERLOADED_ERROR)
        {
            return ProviderError::ServerError {
                provider: provider.to_owned(),
                status_code: status.as_u16(),
            };
        }
        let message = detail.map_or_else(String::new, |d| d.message);
        ProviderError::from_status(provider, status, retry_after, &message)
    }

    fn parse_response(body: &str) -> Result<ChatResponse, ProviderError> {
        let response: MessagesResponse =
            serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
                provider: AiProvider::Anthropic.to_string(),
                message: format!("malformed messages envelope: {e}"),
            })?;

        let content = response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(ChatResponse {
            content,
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            }),
            finish_reason: response.stop_reason,
        })
    }
}

#[async_trait]
impl PlanProvider for AnthropicProvider {
    fn provider(&self) -> AiProvider {
        AiProvider::Anthropic
    }

    fn default_model(&self) -> &str {
        &self.settings.model
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::SYSTEM_MESSAGES | LlmCapabilities::USAGE_REPORTING
    }

    #[instrument(skip(self, request), fields(provider = "anthropic", model = %self.model_for(request)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let provider = AiProvider::Anthropic.as_str();
        let url = format!("{}/v1/messages", self.settings.base_url);

        let response = self
            .client
            .post(url)
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", API_VERSION)
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(provider, e))?;

        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(provider, e))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Anthropic messages request failed");
            return Err(Self::parse_error_response(status, retry_after, &text));
        }

        let parsed = Self::parse_response(&text)?;
        debug!(
            content_len = parsed.content.len(),
            stop_reason = ?parsed.finish_reason,
            "Anthropic response received"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overloaded_is_retryable() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let status = StatusCode::from_u16(529).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        let err = AnthropicProvider::parse_error_response(status, None, body);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_text_blocks_are_joined() {
        let body = r#"{"model":"claude-3-5-sonnet-latest","stop_reason":"end_turn","content":[{"type":"text","text":"{\"a\":"},{"type":"text","text":"1}"}],"usage":{"input_tokens":10,"output_tokens":4}}"#;
        let response = AnthropicProvider::parse_response(body);
        assert!(matches!(
            response,
            Ok(ChatResponse { ref content, usage: Some(TokenUsage { total_tokens: 14, .. }), .. })
                if content == "{\"a\":1}"
        ));
    }
}
