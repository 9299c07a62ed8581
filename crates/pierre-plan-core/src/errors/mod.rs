// ABOUTME: Unified error type, error codes, and HTTP status mapping for plan generation
// ABOUTME: Synchronous failures (invalid request, missing config, full queue) surface as AppError
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling
//!
//! Every synchronous failure of the generation subsystem is an [`AppError`]
//! carrying an [`ErrorCode`]. Asynchronous failures never surface here; they
//! become a `failed` task with a sanitized message (see
//! [`crate::models::FailureKind`]).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the generation subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Capacity (2000-2999)
    #[serde(rename = "GENERATION_QUEUE_FULL")]
    GenerationQueueFull = 2002,

    // Validation (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField = 3001,
    #[serde(rename = "VALUE_OUT_OF_RANGE")]
    ValueOutOfRange = 3003,

    // Resource Management (4000-4999)
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,

    // Configuration (6000-6999)
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6000,
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing = 6001,
    #[serde(rename = "PROVIDER_CONFIG_MISSING")]
    ProviderConfigMissing = 6003,

    // Internal Errors (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "STORAGE_ERROR")]
    StorageError = 9002,
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9003,
    #[serde(rename = "ENCRYPTION_ERROR")]
    EncryptionError = 9004,
}

impl ErrorCode {
    /// Get the HTTP status code an outer transport should use for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput | Self::MissingRequiredField | Self::ValueOutOfRange => 400,

            Self::ResourceNotFound => 404,

            // A missing provider config is a user-fixable precondition
            Self::ProviderConfigMissing => 422,

            Self::GenerationQueueFull => 503,

            Self::InternalError
            | Self::StorageError
            | Self::SerializationError
            | Self::EncryptionError
            | Self::ConfigError
            | Self::ConfigMissing => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::GenerationQueueFull => {
                "Plan generation is at capacity. Please retry in a moment"
            }
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing from the request",
            Self::ValueOutOfRange => "The provided value is outside the acceptable range",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ConfigError => "Configuration error encountered",
            Self::ConfigMissing => "Required configuration is missing",
            Self::ProviderConfigMissing => "No usable AI provider is configured",
            Self::InternalError => "An internal server error occurred",
            Self::StorageError => "Storage operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
            Self::EncryptionError => "Encryption or decryption failed",
        }
    }
}

/// Additional context that can be attached to errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Resource ID if applicable
    pub resource_id: Option<String>,
    /// Additional key-value context
    pub details: Value,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            resource_id: None,
            details: Value::Null,
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Add a resource ID to the error context
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.context.resource_id = Some(resource_id.into());
        self
    }

    /// Add details to the error context
    #[must_use]
    fn with_details(mut self, details: Value) -> Self {
        self.context.details = details;
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Error response body for an outer transport
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Error payload of an [`ErrorResponse`]
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Machine-readable code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Structured details
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                details: error.context.details,
            },
        }
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// Resource not found
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Invalid input
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Value outside an accepted range
    #[must_use]
    pub fn out_of_range(field: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ValueOutOfRange,
            format!("{field}: {}", message.into()),
        )
        .with_details(json!({ "field": field }))
    }

    /// Missing required field
    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("Missing required field: {field}"),
        )
        .with_details(json!({ "field": field }))
    }

    /// Internal server error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Storage backend error
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Required configuration value is missing
    #[must_use]
    pub fn config_missing(name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissing,
            format!("Missing required configuration: {name}"),
        )
    }

    /// No usable AI provider configuration for the caller
    #[must_use]
    pub fn provider_config_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderConfigMissing, message)
    }

    /// Generation capacity exhausted; the caller should retry later
    #[must_use]
    pub fn queue_full(capacity: usize, retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::GenerationQueueFull,
            format!("All {capacity} generation slots are in use"),
        )
        .with_details(json!({ "retry_after_secs": retry_after_secs }))
    }

    /// Encryption or decryption failure
    #[must_use]
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncryptionError, message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::SerializationError,
            format!("JSON processing failed: {error}"),
        )
    }
}
