// ABOUTME: Asynchronous plan-generation pipeline: prompts, parsing, execution, pool and orchestration
// ABOUTME: Start returns a task handle at once; the pipeline finishes the task in the background
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Plan Generation
//!
//! Per task the steps run strictly in order: build the prompt, call the
//! provider through the executor, parse and validate the output, save the
//! plan, then finalize the task record.

/// Timeout, retry and breaker policy around provider calls
pub mod executor;
/// `GenerationOrchestrator` and the background pipeline
pub mod orchestrator;
/// Untrusted provider text to validated plan documents
pub mod parser;
/// Bounded worker pool with panic supervision
pub mod pool;
/// Prompt construction
pub mod prompts;
/// Durable plan storage contract
pub mod repository;

pub use executor::{failure_kind, AttemptBudget, RequestExecutor};
pub use orchestrator::{GenerationOrchestrator, ProviderClientFactory, VendorClientFactory};
pub use parser::{extract_json_object, ParseError, ResponseParser};
pub use pool::{GenerationPool, PoolSlot};
pub use prompts::PromptBuilder;
pub use repository::{save_with_retry, InMemoryPlanRepository, PlanRepository, StoredPlan};
