// ABOUTME: Core data models for the plan-generation subsystem
// ABOUTME: Re-exports task, request, plan document and provider configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! - `GenerationTask`: one tracked asynchronous generation attempt
//! - `GenerationRequest`: validated start-generation input
//! - `PlanDocument`: the schema-conformant result of a generation
//! - `AiProviderConfig`: a user's credential and parameters for one vendor

mod plan;
mod provider_config;
mod request;
mod task;

pub use plan::{
    Exercise, FoodItem, MacroRatio, Meal, MealType, NutritionDay, NutritionPlan, PlanDocument,
    PlanValidationError, TrainingDay, TrainingPlan, TrainingWeek,
};
pub use provider_config::{
    AiProvider, AiProviderConfig, ConnectionStatus, ConnectionTestResult, GenerationSettings,
    ProviderConfigSummary,
};
pub use request::{
    FitnessLevel, GenerationParams, GenerationRequest, NutritionPlanRequest, TrainingPlanRequest,
};
pub use task::{
    FailureKind, GenerationTask, PlanKind, StartedTask, TaskId, TaskStatus, TaskStatusView,
};
