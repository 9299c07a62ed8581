// ABOUTME: Tests for prompt construction from generation requests
// ABOUTME: Athlete parameters and schema reach the prompt; regenerate appends the strict rule
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(missing_docs)]

mod common;

use chrono::NaiveDate;
use common::{nutrition_params, training_params};
use pierre_plan_core::models::{GenerationParams, MacroRatio, PlanKind};
use pierre_plan_generator::generation::prompts::{
    NUTRITION_SCHEMA, REGENERATE_INSTRUCTION, SYSTEM_PROMPT, TRAINING_SCHEMA,
};
use pierre_plan_generator::generation::PromptBuilder;

#[test]
fn test_training_prompt_carries_request_and_schema() {
    let prompt = PromptBuilder::build(&training_params());

    assert_eq!(prompt.kind, PlanKind::Training);
    assert_eq!(prompt.system, SYSTEM_PROMPT.trim_end());
    assert!(prompt.user.contains("1-week training plan"));
    assert!(prompt.user.contains("Build general strength"));
    assert!(prompt.user.contains("dumbbells"));
    assert!(prompt.user.contains("none reported"));
    assert!(prompt.user.ends_with(TRAINING_SCHEMA.trim_end()));
}

#[test]
fn test_nutrition_prompt_formats_targets() {
    let mut params = nutrition_params();
    if let GenerationParams::Nutrition(request) = &mut params {
        request.macro_ratio = Some(MacroRatio {
            protein: 0.3,
            carbs: 0.4,
            fat: 0.3,
        });
        request.allergies = vec!["peanuts".to_owned()];
        request.start_date = NaiveDate::from_ymd_opt(2026, 1, 5);
    }

    let prompt = PromptBuilder::build(&params);

    assert_eq!(prompt.kind, PlanKind::Nutrition);
    assert!(prompt.user.contains("2-day nutrition plan"));
    assert!(prompt.user.contains("2200 kcal"));
    assert!(prompt.user.contains("protein 30%, carbs 40%, fat 30%"));
    assert!(prompt.user.contains("peanuts"));
    assert!(prompt.user.contains("Starting: 2026-01-05"));
    assert!(prompt.user.ends_with(NUTRITION_SCHEMA.trim_end()));
}

#[test]
fn test_build_is_deterministic() {
    assert_eq!(
        PromptBuilder::build(&training_params()),
        PromptBuilder::build(&training_params())
    );
}

#[test]
fn test_regenerate_appends_instruction_once() {
    let prompt = PromptBuilder::build(&training_params());
    let strict = PromptBuilder::regenerate(&prompt);

    assert_eq!(strict.kind, prompt.kind);
    assert_eq!(strict.system, prompt.system);
    assert!(strict.user.starts_with(&prompt.user));
    assert!(strict.user.ends_with(REGENERATE_INSTRUCTION.trim_end()));
    assert_eq!(
        strict.user.matches(REGENERATE_INSTRUCTION.trim_end()).count(),
        1
    );
}
