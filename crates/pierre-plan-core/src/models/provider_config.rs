// ABOUTME: Per-user AI provider configuration with encrypted credentials
// ABOUTME: Closed AiProvider vendor set plus parameter validation for generation settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::constants::providers::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, MAX_TEMPERATURE, MAX_TOKENS_LIMIT,
};
use crate::errors::{AppError, AppResult};

/// Supported AI vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// `OpenAI` chat completions
    OpenAi,
    /// Anthropic Claude messages API
    Anthropic,
    /// Google Gemini
    Gemini,
    /// Groq (Llama, Mixtral via LPU)
    Groq,
    /// `DeepSeek` chat completions
    DeepSeek,
    /// Local OpenAI-compatible server (Ollama, vLLM, `LocalAI`)
    Local,
}

impl AiProvider {
    /// Every supported vendor
    pub const ALL: [Self; 6] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Gemini,
        Self::Groq,
        Self::DeepSeek,
        Self::Local,
    ];

    /// Get provider name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Groq => "groq",
            Self::DeepSeek => "deepseek",
            Self::Local => "local",
        }
    }

    /// Parse provider name from string (case-insensitive)
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "gpt" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "gemini" | "google" => Some(Self::Gemini),
            "groq" => Some(Self::Groq),
            "deepseek" => Some(Self::DeepSeek),
            "local" | "ollama" | "vllm" | "localai" => Some(Self::Local),
            _ => None,
        }
    }

    /// Whether a credential must be configured
    #[must_use]
    pub const fn requires_secret(&self) -> bool {
        !matches!(self, Self::Local)
    }

    /// Whether the vendor has no fixed public endpoint
    #[must_use]
    pub const fn requires_endpoint(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sampling and budget parameters sent with every generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Endpoint override; vendor default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Model identifier; vendor default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Completion token budget
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationSettings {
    /// Check parameter bounds for a vendor
    ///
    /// # Errors
    ///
    /// Returns a validation `AppError` naming the offending field.
    pub fn validate(&self, provider: AiProvider) -> AppResult<()> {
        if !(1..=MAX_TOKENS_LIMIT).contains(&self.max_tokens) {
            return Err(AppError::out_of_range(
                "max_tokens",
                format!("must be within 1..={MAX_TOKENS_LIMIT}"),
            ));
        }
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(AppError::out_of_range(
                "temperature",
                format!("must be within 0..={MAX_TEMPERATURE}"),
            ));
        }
        match &self.endpoint {
            Some(endpoint) if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") => {
                Err(AppError::invalid_input("endpoint must be an http(s) URL"))
            }
            None if provider.requires_endpoint() => Err(AppError::missing_field("endpoint")),
            _ => Ok(()),
        }
    }
}

/// A user's configured credential and endpoint for one provider
#[derive(Clone, Serialize, Deserialize)]
pub struct AiProviderConfig {
    /// Config id
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// Vendor
    pub provider: AiProvider,
    /// Display name chosen by the user
    pub name: String,
    /// Base64 AES-GCM ciphertext of the credential; empty for keyless vendors
    pub encrypted_secret: String,
    /// Generation parameters
    pub settings: GenerationSettings,
    /// At most one config per owner holds the default
    pub is_default: bool,
    /// Disabled configs are never resolved for generation
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl AiProviderConfig {
    /// Whether a credential was stored
    #[must_use]
    pub fn has_secret(&self) -> bool {
        !self.encrypted_secret.is_empty()
    }

    /// Projection safe to return to callers
    #[must_use]
    pub fn summary(&self) -> ProviderConfigSummary {
        ProviderConfigSummary {
            id: self.id,
            provider: self.provider,
            name: self.name.clone(),
            model: self.settings.model.clone(),
            endpoint: self.settings.endpoint.clone(),
            has_secret: self.has_secret(),
            is_default: self.is_default,
            is_active: self.is_active,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for AiProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiProviderConfig")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("provider", &self.provider)
            .field("name", &self.name)
            .field("encrypted_secret", &"[REDACTED]")
            .field("settings", &self.settings)
            .field("is_default", &self.is_default)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Config listing entry without credential material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfigSummary {
    /// Config id
    pub id: Uuid,
    /// Vendor
    pub provider: AiProvider,
    /// Display name
    pub name: String,
    /// Model override
    pub model: Option<String>,
    /// Endpoint override
    pub endpoint: Option<String>,
    /// Whether a credential is stored
    pub has_secret: bool,
    /// Default flag
    pub is_default: bool,
    /// Enabled flag
    pub is_active: bool,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a provider connection test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Provider answered a tiny completion
    Success,
    /// Provider could not be reached or refused the request
    Failure,
}

/// Connection test report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    /// Success or failure
    pub status: ConnectionStatus,
    /// Round trip of the test call
    pub response_time_ms: u64,
    /// Model that answered, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<String>,
    /// Sanitized human-readable detail
    pub message: String,
}
