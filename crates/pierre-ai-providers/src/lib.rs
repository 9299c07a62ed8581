// ABOUTME: AI provider clients for plan generation (OpenAI-compatible, Anthropic, Gemini)
// ABOUTME: Capability trait, closed provider enum, error taxonomy, shared HTTP client, circuit breaker
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! AI provider clients for the Pierre plan generator.
//!
//! The generation pipeline only sees [`PlanProvider`], [`ProviderClient`] and
//! [`ProviderError`]; vendor wire formats stay inside their modules.

/// Anthropic Claude messages API
mod anthropic;
/// Vendor-neutral chat types and capability flags
pub mod chat;
/// Per-vendor circuit breaker
pub mod circuit_breaker;
/// Provider error taxonomy
pub mod errors;
/// Google Gemini generateContent API
mod gemini;
/// Shared HTTP client for vendor API calls
pub mod http_client;
/// OpenAI-compatible chat completions (`OpenAI`, Groq, `DeepSeek`, local)
mod openai_compatible;
/// Capability trait and closed client enum
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use chat::{ChatMessage, ChatRequest, ChatResponse, LlmCapabilities, PlanPrompt, TokenUsage};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakers, CircuitState};
pub use errors::ProviderError;
pub use http_client::{configure_shared_client, HttpClientSettings};
pub use gemini::GeminiProvider;
pub use openai_compatible::OpenAiCompatibleProvider;
pub use provider::{generate_for_kind, ClientSettings, PlanProvider, ProviderClient};
