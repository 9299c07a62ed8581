// ABOUTME: OpenAI-compatible chat completions client shared by OpenAI, Groq, DeepSeek and local servers
// ABOUTME: Per-vendor base URL, default model and capabilities over one wire format
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `OpenAI`-Compatible Provider
//!
//! One implementation of the `/chat/completions` wire format, configured per
//! vendor:
//!
//! - **`OpenAI`**: <https://api.openai.com/v1>
//! - **Groq**: <https://api.groq.com/openai/v1>
//! - **`DeepSeek`**: <https://api.deepseek.com/v1>
//! - **Local** (Ollama, vLLM, `LocalAI`): endpoint from the config

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

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";

/// Ollama's OpenAI-compatible endpoint, used only if a local config lost its endpoint
const LOCAL_BASE_URL: &str = "http://localhost:11434/v1";
const LOCAL_DEFAULT_MODEL: &str = "qwen2.5:14b-instruct";

/// OpenAI error code for an exhausted billing quota (sent with HTTP 429)
const INSUFFICIENT_QUOTA: &str = "insufficient_quota";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Client for any `OpenAI`-compatible chat completions endpoint
pub struct OpenAiCompatibleProvider {
    vendor: AiProvider,
    settings: ClientSettings,
    api_key: Option<Zeroizing<String>>,
    capabilities: LlmCapabilities,
    client: &'static Client,
}

impl OpenAiCompatibleProvider {
    fn build(
        vendor: AiProvider,
        config: &AiProviderConfig,
        api_key: Option<Zeroizing<String>>,
        (base_url, model): (&str, &str),
        capabilities: LlmCapabilities,
    ) -> Self {
        Self {
            vendor,
            settings: ClientSettings::resolve(config, base_url, model),
            api_key,
            capabilities,
            client: shared_client(),
        }
    }

    /// `OpenAI` client
    #[must_use]
    pub fn openai(config: &AiProviderConfig, api_key: Option<Zeroizing<String>>) -> Self {
        Self::build(
            AiProvider::OpenAi,
            config,
            api_key,
            (OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL),
            LlmCapabilities::hosted(),
        )
    }

    /// Groq client
    #[must_use]
    pub fn groq(config: &AiProviderConfig, api_key: Option<Zeroizing<String>>) -> Self {
        Self::build(
            AiProvider::Groq,
            config,
            api_key,
            (GROQ_BASE_URL, GROQ_DEFAULT_MODEL),
            LlmCapabilities::hosted(),
        )
    }

    /// `DeepSeek` client
    #[must_use]
    pub fn deepseek(config: &AiProviderConfig, api_key: Option<Zeroizing<String>>) -> Self {
        Self::build(
            AiProvider::DeepSeek,
            config,
            api_key,
            (DEEPSEEK_BASE_URL, DEEPSEEK_DEFAULT_MODEL),
            LlmCapabilities::hosted(),
        )
    }

    /// Local server client; JSON mode is not assumed
    #[must_use]
    pub fn local(config: &AiProviderConfig, api_key: Option<Zeroizing<String>>) -> Self {
        Self::build(
            AiProvider::Local,
            config,
            api_key,
            (LOCAL_BASE_URL, LOCAL_DEFAULT_MODEL),
            LlmCapabilities::SYSTEM_MESSAGES,
        )
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.settings.base_url)
    }

    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.settings.model)
    }

    fn build_request<'a>(&'a self, request: &'a ChatRequest) -> OpenAiRequest<'a> {
        let response_format = (request.json_output && self.capabilities.supports_json_mode())
            .then_some(ResponseFormat {
                format_type: "json_object",
            });

        OpenAiRequest {
            model: self.model_for(request),
            messages: request
                .messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature.unwrap_or(self.settings.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.settings.max_tokens),
            response_format,
        }
    }

    /// Map an error status and body to a provider error
    fn parse_error_response(
        provider: &str,
        status: StatusCode,
        retry_after: Option<u64>,
        body: &str,
    ) -> ProviderError {
        let detail = serde_json::from_str::<OpenAiErrorResponse>(body)
            .ok()
            .map(|r| r.error);

        let quota_exhausted = detail.as_ref().is_some_and(|d| {
            d.code.as_deref() == Some(INSUFFICIENT_QUOTA)
                || d.error_type.as_deref() == Some(INSUFFICIENT_QUOTA)
        });
        if status == StatusCode::TOO_MANY_REQUESTS && quota_exhausted {
            return ProviderError::InvalidRequest {
                provider: provider.to_owned(),
                status_code: status.as_u16(),
                message: "account quota exhausted".to_owned(),
            };
        }

        let message = detail.map_or_else(String::new, |d| d.message);
        ProviderError::from_status(provider, status, retry_after, &message)
    }

    fn parse_response(provider: &str, body: &str) -> Result<ChatResponse, ProviderError> {
        let response: OpenAiResponse =
            serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
                provider: provider.to_owned(),
                message: format!("malformed completion envelope: {e}"),
            })?;

        let choice =
            response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::InvalidResponse {
                    provider: provider.to_owned(),
                    message: "API returned no choices".to_owned(),
                })?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or_default(),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl PlanProvider for OpenAiCompatibleProvider {
    fn provider(&self) -> AiProvider {
        self.vendor
    }

    fn default_model(&self) -> &str {
        &self.settings.model
    }

    fn capabilities(&self) -> LlmCapabilities {
        self.capabilities
    }

    #[instrument(skip(self, request), fields(provider = %self.vendor, model = %self.model_for(request)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let provider = self.vendor.as_str();
        let body = self.build_request(request);

        let mut http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key.as_str());
        }

        let response = http_request
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
            warn!(status = status.as_u16(), "Chat completion request failed");
            return Err(Self::parse_error_response(provider, status, retry_after, &text));
        }

        let mut parsed = Self::parse_response(provider, &text)?;
        if parsed.model.is_empty() {
            parsed.model = self.model_for(request).to_owned();
        }
        debug!(
            content_len = parsed.content.len(),
            finish_reason = ?parsed.finish_reason,
            "Chat completion received"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use chrono::Utc;
    use pierre_plan_core::models::GenerationSettings;
    use uuid::Uuid;

    fn config(provider: AiProvider, endpoint: Option<&str>) -> AiProviderConfig {
        let now = Utc::now();
        AiProviderConfig {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            provider,
            name: "test".to_owned(),
            encrypted_secret: String::new(),
            settings: GenerationSettings {
                endpoint: endpoint.map(str::to_owned),
                ..GenerationSettings::default()
            },
            is_default: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn json_request() -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system("Return JSON"),
            ChatMessage::user("plan"),
        ])
        .with_json_output()
    }

    #[test]
    fn test_json_mode_only_for_capable_vendors() -> Result<(), serde_json::Error> {
        let request = json_request();

        let groq = OpenAiCompatibleProvider::groq(&config(AiProvider::Groq, None), None);
        let body = serde_json::to_value(groq.build_request(&request))?;
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["model"], GROQ_DEFAULT_MODEL);
        assert_eq!(body["messages"][0]["role"], "system");

        let local = OpenAiCompatibleProvider::local(
            &config(AiProvider::Local, Some("http://localhost:8000/v1/")),
            None,
        );
        let body = serde_json::to_value(local.build_request(&request))?;
        assert!(body.get("response_format").is_none());
        assert_eq!(
            local.api_url("chat/completions"),
            "http://localhost:8000/v1/chat/completions"
        );
        Ok(())
    }

    #[test]
    fn test_quota_exhaustion_is_not_retryable() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let err = OpenAiCompatibleProvider::parse_error_response(
            "openai",
            StatusCode::TOO_MANY_REQUESTS,
            None,
            body,
        );
        assert!(!err.is_retryable());

        let throttled = OpenAiCompatibleProvider::parse_error_response(
            "openai",
            StatusCode::TOO_MANY_REQUESTS,
            Some(2),
            r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#,
        );
        assert_eq!(
            throttled,
            ProviderError::RateLimited {
                provider: "openai".to_owned(),
                retry_after_secs: Some(2),
            }
        );
    }

    #[test]
    fn test_auth_failure_drops_vendor_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided: sk-proj-abc***xyz","code":"invalid_api_key"}}"#;
        let err = OpenAiCompatibleProvider::parse_error_response(
            "openai",
            StatusCode::UNAUTHORIZED,
            None,
            body,
        );
        assert!(matches!(err, ProviderError::AuthenticationFailed { .. }));
        assert!(!err.to_string().contains("sk-proj"));
    }

    #[test]
    fn test_parse_response_extracts_first_choice() {
        let body = r#"{"model":"gpt-4o-mini","choices":[{"message":{"content":"{\"ok\":true}"},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":3,"total_tokens":8}}"#;
        let response = OpenAiCompatibleProvider::parse_response("openai", body);
        assert!(matches!(
            response,
            Ok(ChatResponse { ref content, .. }) if content == "{\"ok\":true}"
        ));

        let empty = OpenAiCompatibleProvider::parse_response("openai", r#"{"choices":[]}"#);
        assert!(matches!(empty, Err(ProviderError::InvalidResponse { .. })));
    }
}
