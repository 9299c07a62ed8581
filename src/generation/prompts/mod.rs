// ABOUTME: Provider-agnostic prompt construction for training and nutrition plan generation
// ABOUTME: Instruction and schema text is loaded at compile time from markdown files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Plan Prompts
//!
//! [`PromptBuilder`] is a pure function of a validated request. The same
//! prompt is reused verbatim for every retry of a task; only the one-shot
//! regenerate after unusable output appends a stricter instruction.

use chrono::NaiveDate;
use pierre_ai_providers::PlanPrompt;
use pierre_plan_core::models::{GenerationParams, NutritionPlanRequest, TrainingPlanRequest};

/// Role and output rules shared by both plan kinds
pub const SYSTEM_PROMPT: &str = include_str!("system.md");

/// JSON shape of a training plan
pub const TRAINING_SCHEMA: &str = include_str!("training_schema.md");

/// JSON shape of a nutrition plan
pub const NUTRITION_SCHEMA: &str = include_str!("nutrition_schema.md");

/// Appended once when the previous output could not be parsed
pub const REGENERATE_INSTRUCTION: &str = include_str!("regenerate.md");

/// Builds prompts from generation requests
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt for a validated request
    #[must_use]
    pub fn build(params: &GenerationParams) -> PlanPrompt {
        let (brief, schema) = match params {
            GenerationParams::Training(request) => (training_brief(request), TRAINING_SCHEMA),
            GenerationParams::Nutrition(request) => (nutrition_brief(request), NUTRITION_SCHEMA),
        };

        PlanPrompt {
            kind: params.kind(),
            system: SYSTEM_PROMPT.trim_end().to_owned(),
            user: format!("{brief}\n\n{}", schema.trim_end()),
        }
    }

    /// Same prompt with the strict JSON-only instruction appended
    #[must_use]
    pub fn regenerate(prompt: &PlanPrompt) -> PlanPrompt {
        PlanPrompt {
            kind: prompt.kind,
            system: prompt.system.clone(),
            user: format!("{}\n\n{}", prompt.user, REGENERATE_INSTRUCTION.trim_end()),
        }
    }
}

fn list_or(items: &[String], fallback: &str) -> String {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        fallback.to_owned()
    } else {
        items.join(", ")
    }
}

fn date_line(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<String> {
    match (start, end) {
        (Some(start), Some(end)) => Some(format!("- Dates: {start} to {end}")),
        (Some(start), None) => Some(format!("- Starting: {start}")),
        (None, Some(end)) => Some(format!("- Finishing by: {end}")),
        (None, None) => None,
    }
}

fn training_brief(request: &TrainingPlanRequest) -> String {
    let mut lines = vec![
        format!(
            "Create a {}-week training plan for a {} athlete.",
            request.duration_weeks,
            request.fitness_level.as_str()
        ),
        String::new(),
        "Athlete profile:".to_owned(),
        format!("- Goal: {}", request.goal.trim()),
        format!(
            "- Training days per week: {} (fill the remaining days of each week with rest days)",
            request.days_per_week
        ),
        format!("- Session length: about {} minutes", request.session_minutes),
        format!(
            "- Available equipment: {}",
            list_or(&request.equipment, "bodyweight only")
        ),
        format!("- Focus areas: {}", list_or(&request.focus_areas, "balanced")),
        format!(
            "- Injuries or limitations: {}",
            list_or(&request.limitations, "none reported")
        ),
    ];
    lines.extend(date_line(request.start_date, request.end_date));
    lines.join("\n")
}

fn nutrition_brief(request: &NutritionPlanRequest) -> String {
    let calories = request.daily_calories.map_or_else(
        || "choose an appropriate target for the goal".to_owned(),
        |c| format!("{c:.0} kcal"),
    );
    let macros = request.macro_ratio.map_or_else(
        || "choose ratios that suit the goal".to_owned(),
        |r| {
            format!(
                "protein {:.0}%, carbs {:.0}%, fat {:.0}%",
                r.protein * 100.0,
                r.carbs * 100.0,
                r.fat * 100.0
            )
        },
    );

    let mut lines = vec![
        format!("Create a {}-day nutrition plan.", request.duration_days),
        String::new(),
        "Client profile:".to_owned(),
        format!("- Goal: {}", request.goal.trim()),
        format!("- Daily calories: {calories}"),
        format!("- Macro split: {macros}"),
        format!("- Meals per day: {}", request.meals_per_day),
        format!(
            "- Dietary restrictions: {}",
            list_or(&request.dietary_restrictions, "none")
        ),
        format!("- Allergies: {}", list_or(&request.allergies, "none reported")),
    ];
    lines.extend(date_line(request.start_date, request.end_date));
    lines.join("\n")
}
