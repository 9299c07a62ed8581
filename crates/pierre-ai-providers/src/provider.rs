// ABOUTME: Uniform plan-provider capability trait and the closed ProviderClient enum
// ABOUTME: One variant per vendor, built once from a provider config and a decrypted secret
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Provider Clients
//!
//! [`PlanProvider`] is the capability contract every vendor fulfils:
//! generate a training plan, generate a nutrition plan, test the connection.
//! Vendor request and response shapes stay inside each implementation.
//!
//! [`ProviderClient`] is the closed set of vendors. It is resolved once from
//! an [`AiProviderConfig`] so an unsupported vendor cannot reach a call site.

use std::fmt;

use async_trait::async_trait;
use pierre_plan_core::constants::generation::CONNECTION_TEST_MAX_TOKENS;
use pierre_plan_core::errors::{AppError, AppResult};
use pierre_plan_core::models::{AiProvider, AiProviderConfig, PlanKind};
use tracing::debug;
use zeroize::Zeroizing;

use crate::anthropic::AnthropicProvider;
use crate::chat::{ChatMessage, ChatRequest, ChatResponse, LlmCapabilities, PlanPrompt};
use crate::errors::ProviderError;
use crate::gemini::GeminiProvider;
use crate::openai_compatible::OpenAiCompatibleProvider;

/// Resolved parameters a vendor client sends with every call
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// API base URL without trailing slash
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion budget
    pub max_tokens: u32,
}

impl ClientSettings {
    /// Overlay a config's overrides on vendor defaults
    #[must_use]
    pub fn resolve(config: &AiProviderConfig, default_base_url: &str, default_model: &str) -> Self {
        let settings = &config.settings;
        Self {
            base_url: settings
                .endpoint
                .as_deref()
                .unwrap_or(default_base_url)
                .trim_end_matches('/')
                .to_owned(),
            model: settings
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_owned()),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Plan generation capability contract
#[async_trait]
pub trait PlanProvider: Send + Sync {
    /// Vendor behind this client
    fn provider(&self) -> AiProvider;

    /// Model used when a request does not name one
    fn default_model(&self) -> &str;

    /// Provider capabilities
    fn capabilities(&self) -> LlmCapabilities;

    /// Perform one chat completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Generate raw training plan output for a prompt
    async fn generate_training_plan(&self, prompt: &PlanPrompt) -> Result<String, ProviderError> {
        generate_plan_text(self, prompt).await
    }

    /// Generate raw nutrition plan output for a prompt
    async fn generate_nutrition_plan(&self, prompt: &PlanPrompt) -> Result<String, ProviderError> {
        generate_plan_text(self, prompt).await
    }

    /// Issue a tiny completion and report the model that answered
    async fn test_connection(&self) -> Result<String, ProviderError> {
        let request = ChatRequest::new(vec![ChatMessage::user("Reply with the single word: ok")])
            .with_max_tokens(CONNECTION_TEST_MAX_TOKENS);
        let response = self.complete(&request).await?;
        Ok(response.model)
    }
}

/// Dispatch a prompt to the generation method for its kind
///
/// # Errors
///
/// Returns the provider's error for the call.
pub async fn generate_for_kind<P>(provider: &P, prompt: &PlanPrompt) -> Result<String, ProviderError>
where
    P: PlanProvider + ?Sized,
{
    match prompt.kind {
        PlanKind::Training => provider.generate_training_plan(prompt).await,
        PlanKind::Nutrition => provider.generate_nutrition_plan(prompt).await,
    }
}

async fn generate_plan_text<P>(provider: &P, prompt: &PlanPrompt) -> Result<String, ProviderError>
where
    P: PlanProvider + ?Sized,
{
    debug!(
        provider = %provider.provider(),
        kind = %prompt.kind,
        prompt_len = prompt.len(),
        "Requesting plan generation"
    );
    let response = provider.complete(&prompt.to_chat_request()).await?;

    if response.content.trim().is_empty() {
        return Err(ProviderError::InvalidResponse {
            provider: provider.provider().to_string(),
            message: format!(
                "empty completion (finish_reason={})",
                response.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }
    if let Some(usage) = response.usage {
        debug!(
            provider = %provider.provider(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Plan generation token usage"
        );
    }
    Ok(response.content)
}

/// Closed set of vendor clients
pub enum ProviderClient {
    /// `OpenAI` chat completions
    OpenAi(OpenAiCompatibleProvider),
    /// Anthropic messages API
    Anthropic(AnthropicProvider),
    /// Google Gemini generateContent API
    Gemini(GeminiProvider),
    /// Groq OpenAI-compatible endpoint
    Groq(OpenAiCompatibleProvider),
    /// `DeepSeek` OpenAI-compatible endpoint
    DeepSeek(OpenAiCompatibleProvider),
    /// Local OpenAI-compatible server
    Local(OpenAiCompatibleProvider),
}

impl ProviderClient {
    /// Build the client for a config with its decrypted secret
    ///
    /// The secret is moved into the client and wiped when the client drops.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the vendor needs a secret and none
    /// was supplied, or when the settings are out of range.
    pub fn from_config(
        config: &AiProviderConfig,
        secret: Option<Zeroizing<String>>,
    ) -> AppResult<Self> {
        config.settings.validate(config.provider)?;
        let secret = secret.filter(|s| !s.trim().is_empty());
        if config.provider.requires_secret() && secret.is_none() {
            return Err(AppError::config(format!(
                "{} configuration has no stored credential",
                config.provider
            )));
        }

        let client = match config.provider {
            AiProvider::OpenAi => Self::OpenAi(OpenAiCompatibleProvider::openai(config, secret)),
            AiProvider::Groq => Self::Groq(OpenAiCompatibleProvider::groq(config, secret)),
            AiProvider::DeepSeek => {
                Self::DeepSeek(OpenAiCompatibleProvider::deepseek(config, secret))
            }
            AiProvider::Local => Self::Local(OpenAiCompatibleProvider::local(config, secret)),
            AiProvider::Anthropic => match secret {
                Some(secret) => Self::Anthropic(AnthropicProvider::new(config, secret)),
                None => return Err(AppError::config("anthropic credential missing")),
            },
            AiProvider::Gemini => match secret {
                Some(secret) => Self::Gemini(GeminiProvider::new(config, secret)),
                None => return Err(AppError::config("gemini credential missing")),
            },
        };
        Ok(client)
    }

    fn inner(&self) -> &dyn PlanProvider {
        match self {
            Self::OpenAi(p) | Self::Groq(p) | Self::DeepSeek(p) | Self::Local(p) => p,
            Self::Anthropic(p) => p,
            Self::Gemini(p) => p,
        }
    }
}

#[async_trait]
impl PlanProvider for ProviderClient {
    fn provider(&self) -> AiProvider {
        self.inner().provider()
    }

    fn default_model(&self) -> &str {
        self.inner().default_model()
    }

    fn capabilities(&self) -> LlmCapabilities {
        self.inner().capabilities()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.inner().complete(request).await
    }
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &self.provider())
            .field("model", &self.default_model())
            .field("credential", &"[REDACTED]")
            .finish()
    }
}
