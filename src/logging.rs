// ABOUTME: Logging configuration and structured logging setup for the plan generator
// ABOUTME: Configures log levels, formatters, and noise filters for tracing-subscriber
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Structured logging setup
//!
//! Log lines carry task ids, owner ids, provider names and timings. They
//! never carry credentials, prompt text or raw provider payloads.

use anyhow::Result;
use std::env;
use std::io;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use pierre_plan_core::models::{FailureKind, PlanKind, TaskId};
use uuid::Uuid;

/// Service name reported at startup
const SERVICE_NAME: &str = "pierre-plan-generator";

/// Dependencies whose debug output drowns the pipeline's own logs
const NOISE_DIRECTIVES: &[&str] = &[
    "hyper=warn",
    "hyper::proto=warn",
    "reqwest=warn",
    "rustls=warn",
    "redis=info",
];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
    /// Emit span open/close events
    pub include_spans: bool,
    /// Environment (development, staging, production)
    pub environment: String,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// `JSON` format for production logging
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact format for space-constrained environments
    Compact,
}

impl LogFormat {
    /// Parse a `LOG_FORMAT` value, defaulting to pretty
    #[must_use]
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value.map(str::to_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("compact") => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            include_location: false,
            include_spans: false,
            environment: "development".into(),
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let is_production = environment == "production";

        Self {
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            format: LogFormat::parse_or_default(env::var("LOG_FORMAT").ok().as_deref()),
            include_location: is_production || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            include_spans: env::var("LOG_INCLUDE_SPANS").is_ok(),
            environment,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new(&self.level);
        for directive in NOISE_DIRECTIVES {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Initialize the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed
    pub fn init(&self) -> Result<()> {
        let registry = tracing_subscriber::registry().with(self.env_filter());

        match self.format {
            LogFormat::Json => {
                let layer = fmt::layer()
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_target(true)
                    .with_writer(io::stdout)
                    .with_span_events(self.span_events())
                    .json();
                registry.with(layer).try_init()?;
            }
            LogFormat::Pretty => {
                let layer = fmt::layer()
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_target(true)
                    .with_writer(io::stdout)
                    .with_span_events(self.span_events());
                registry.with(layer).try_init()?;
            }
            LogFormat::Compact => {
                let layer = fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(io::stdout)
                    .with_span_events(FmtSpan::NONE);
                registry.with(layer).try_init()?;
            }
        }

        info!(
            service.name = SERVICE_NAME,
            service.version = env!("CARGO_PKG_VERSION"),
            environment = %self.environment,
            log.level = %self.level,
            log.format = ?self.format,
            "Plan generator logging initialized"
        );
        Ok(())
    }
}

/// Initialize logging from environment
///
/// # Errors
///
/// Returns an error if logging initialization fails
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}

/// Structured events for the generation lifecycle
pub struct GenerationLogger;

impl GenerationLogger {
    /// A task was admitted and created
    pub fn log_task_started(task_id: &TaskId, owner_id: Uuid, kind: PlanKind, provider: &str) {
        info!(
            task.id = %task_id,
            user.id = %owner_id,
            plan.kind = %kind,
            ai.provider = %provider,
            "Plan generation started"
        );
    }

    /// A task reached `completed`
    pub fn log_task_completed(task_id: &TaskId, kind: PlanKind, attempts: u32, duration_ms: u64) {
        info!(
            task.id = %task_id,
            plan.kind = %kind,
            generation.attempts = attempts,
            generation.duration_ms = duration_ms,
            "Plan generation completed"
        );
    }

    /// A task reached `failed`
    pub fn log_task_failed(
        task_id: &TaskId,
        kind: PlanKind,
        failure: FailureKind,
        attempts: u32,
        duration_ms: u64,
    ) {
        warn!(
            task.id = %task_id,
            plan.kind = %kind,
            generation.failure = ?failure,
            generation.attempts = attempts,
            generation.duration_ms = duration_ms,
            "Plan generation failed"
        );
    }
}
