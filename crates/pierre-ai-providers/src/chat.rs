// ABOUTME: Vendor-neutral chat request and response types plus capability flags
// ABOUTME: PlanPrompt carries a built prompt into any provider client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use pierre_plan_core::models::PlanKind;
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Provider capability flags
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LlmCapabilities: u8 {
        /// Provider supports a native JSON output mode
        const JSON_MODE = 0b0000_0001;
        /// Provider accepts a separate system instruction
        const SYSTEM_MESSAGES = 0b0000_0010;
        /// Provider reports token usage
        const USAGE_REPORTING = 0b0000_0100;
    }
}

impl LlmCapabilities {
    /// Capabilities of hosted OpenAI-style APIs
    #[must_use]
    pub const fn hosted() -> Self {
        Self::JSON_MODE
            .union(Self::SYSTEM_MESSAGES)
            .union(Self::USAGE_REPORTING)
    }

    /// Check if JSON mode is supported
    #[must_use]
    pub const fn supports_json_mode(&self) -> bool {
        self.contains(Self::JSON_MODE)
    }

    /// Check if system messages are supported
    #[must_use]
    pub const fn supports_system_messages(&self) -> bool {
        self.contains(Self::SYSTEM_MESSAGES)
    }
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Configuration for a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Model identifier; the client's configured model when absent
    pub model: Option<String>,
    /// Temperature; the client's configured value when absent
    pub temperature: Option<f32>,
    /// Completion budget; the client's configured value when absent
    pub max_tokens: Option<u32>,
    /// Ask the vendor for a bare JSON object when it supports that
    pub json_output: bool,
}

impl ChatRequest {
    /// Create a new chat request with messages
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            json_output: false,
        }
    }

    /// Set the model to use
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request JSON output mode
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// The system instruction, if any
    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }

    /// Non-system messages in order
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
    }
}

/// Response from a chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated message content
    pub content: String,
    /// Model used for generation
    pub model: String,
    /// Token usage statistics
    pub usage: Option<TokenUsage>,
    /// Finish reason (stop, length, etc.)
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Provider-agnostic prompt for one plan generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPrompt {
    /// Plan being requested
    pub kind: PlanKind,
    /// Role and output-format instruction
    pub system: String,
    /// Athlete parameters and schema
    pub user: String,
}

impl PlanPrompt {
    /// Chat request carrying this prompt in JSON output mode
    #[must_use]
    pub fn to_chat_request(&self) -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ])
        .with_json_output()
    }

    /// Total prompt length, for logging in place of the text
    #[must_use]
    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    /// Whether both parts are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.is_empty()
    }
}
