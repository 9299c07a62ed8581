// ABOUTME: Library entry point for the Pierre AI plan generator
// ABOUTME: Asynchronous training and nutrition plan generation against pluggable AI providers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Pierre Plan Generator
//!
//! Accepts "generate a training or nutrition plan" requests, hands back an
//! opaque task handle immediately and runs the provider call in a bounded
//! background pool. Callers poll the task until it is `completed` with a
//! plan reference or `failed` with a sanitized message.
//!
//! ## Architecture
//!
//! - **generation**: prompt builder, response parser, request executor,
//!   worker pool, plan repository and the orchestrator tying them together
//! - **tasks**: task store with write-once terminal states (memory, Redis)
//! - **`provider_configs`**: per-user AI provider configurations with a
//!   unique default
//! - **crypto**: AES-256-GCM cipher for stored provider credentials
//! - **config**: environment-driven settings
//! - **logging**: `tracing` subscriber setup and lifecycle events
//!
//! Vendor clients live in `pierre-ai-providers`; shared types and errors
//! in `pierre-plan-core`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pierre_plan_generator::config::{GenerationConfig, TaskStoreConfig};
//! use pierre_plan_generator::crypto::SecretCipher;
//! use pierre_plan_generator::generation::{GenerationOrchestrator, InMemoryPlanRepository};
//! use pierre_plan_generator::provider_configs::InMemoryProviderConfigStore;
//! use pierre_plan_generator::tasks::create_task_store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     pierre_plan_generator::logging::init_from_env()?;
//!
//!     let config = GenerationConfig::from_env();
//!     config.validate()?;
//!     let tasks = create_task_store(&TaskStoreConfig::from_env()?, config.task_ttl).await?;
//!     let cipher = Arc::new(SecretCipher::load_or_generate()?);
//!
//!     let orchestrator = GenerationOrchestrator::new(
//!         config,
//!         tasks,
//!         Arc::new(InMemoryProviderConfigStore::new(Arc::clone(&cipher))),
//!         Arc::new(InMemoryPlanRepository::new()),
//!         cipher,
//!     );
//!     println!("queue capacity: {}", orchestrator.pool().capacity());
//!     Ok(())
//! }
//! ```

/// Environment-driven configuration
pub mod config;

/// Credential encryption
pub mod crypto;

/// Plan generation pipeline
pub mod generation;

/// Structured logging setup
pub mod logging;

/// Per-user AI provider configuration storage
pub mod provider_configs;

/// Generation task records
pub mod tasks;

pub use pierre_ai_providers as providers;
pub use pierre_plan_core::errors::{AppError, AppResult, ErrorCode};
pub use pierre_plan_core::models;
