// ABOUTME: Google Gemini generateContent client for plan generation
// ABOUTME: Sends the system prompt as system_instruction and requests JSON via response_mime_type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::{Debug, Formatter, Result as FmtResult};

use async_trait::async_trait;
use pierre_plan_core::models::{AiProvider, AiProviderConfig};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::chat::{ChatRequest, ChatResponse, LlmCapabilities, MessageRole, TokenUsage};
use crate::errors::{retry_after_secs, ProviderError};
use crate::http_client::shared_client;
use crate::provider::{ClientSettings, PlanProvider};

/// Base URL for the Gemini API
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model to use
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini reports an invalid key as 400 with this reason
const API_KEY_INVALID: &str = "API_KEY_INVALID";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    candidate_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(rename = "modelVersion", default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates: u32,
    #[serde(rename = "totalTokenCount", default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Google Gemini client
pub struct GeminiProvider {
    settings: ClientSettings,
    api_key: Zeroizing<String>,
    client: &'static Client,
}

impl Debug for GeminiProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiProvider")
            .field("model", &self.settings.model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
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

    /// The key travels in a header so it never appears in a logged URL
    fn build_url(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.settings.base_url)
    }

    fn build_request<'a>(&self, request: &'a ChatRequest) -> GeminiRequest<'a> {
        let contents = request
            .conversation()
            .map(|m| GeminiContent {
                role: Some(if m.role == MessageRole::Assistant {
                    "model"
                } else {
                    "user"
                }),
                parts: vec![TextPart { text: &m.content }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: request.system_prompt().map(|text| GeminiContent {
                role: None,
                parts: vec![TextPart { text }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature.unwrap_or(self.settings.temperature),
                max_output_tokens: request.max_tokens.unwrap_or(self.settings.max_tokens),
                candidate_count: 1,
                response_mime_type: request.json_output.then_some("application/json"),
            },
        }
    }

    fn parse_error_response(
        status: StatusCode,
        retry_after: Option<u64>,
        body: &str,
    ) -> ProviderError {
        let provider = AiProvider::Gemini.as_str();
        let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(body) else {
            return ProviderError::from_status(provider, status, retry_after, "");
        };

        let key_invalid = error_response
            .error
            .details
            .iter()
            .any(|d| d.get("reason").and_then(|r| r.as_str()) == Some(API_KEY_INVALID));
        if key_invalid {
            return ProviderError::AuthenticationFailed {
                provider: provider.to_owned(),
            };
        }
        ProviderError::from_status(provider, status, retry_after, &error_response.error.message)
    }

    fn parse_response(body: &str, model: &str) -> Result<ChatResponse, ProviderError> {
        let response: GeminiResponse =
            serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
                provider: AiProvider::Gemini.to_string(),
                message: format!("malformed generateContent envelope: {e}"),
            })?;

        let candidate =
            response
                .candidates
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::InvalidResponse {
                    provider: AiProvider::Gemini.to_string(),
                    message: "no candidates in response".to_owned(),
                })?;

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            model: response.model_version.unwrap_or_else(|| model.to_owned()),
            usage: response.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt,
                completion_tokens: u.candidates,
                total_tokens: u.total,
            }),
            finish_reason: candidate.finish_reason,
        })
    }
}

#[async_trait]
impl PlanProvider for GeminiProvider {
    fn provider(&self) -> AiProvider {
        AiProvider::Gemini
    }

    fn default_model(&self) -> &str {
        &self.settings.model
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::hosted()
    }

    #[instrument(skip(self, request), fields(provider = "gemini", model = %self.model_for(request)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let provider = AiProvider::Gemini.as_str();
        let model = self.model_for(request);

        let response = self
            .client
            .post(self.build_url(model))
            .header("x-goog-api-key", self.api_key.as_str())
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
            warn!(status = status.as_u16(), "Gemini API error");
            return Err(Self::parse_error_response(status, retry_after, &text));
        }

        let parsed = Self::parse_response(&text, model)?;
        debug!(
            content_len = parsed.content.len(),
            finish_reason = ?parsed.finish_reason,
            "Gemini response received"
        );
        Ok(parsed)
    }
}
