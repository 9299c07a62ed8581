// ABOUTME: Tests for ResponseParser isolation and validation of untrusted provider output
// ABOUTME: Truncated JSON, out-of-range numbers, prose, fences and envelopes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{nutrition_params, training_params, NUTRITION_PLAN_JSON, TRAINING_PLAN_JSON};
use pierre_plan_core::models::{GenerationParams, PlanDocument, PlanKind};
use pierre_plan_generator::generation::{ParseError, ResponseParser};

#[test]
fn test_bare_training_json_parses() {
    let plan = ResponseParser::parse(TRAINING_PLAN_JSON, PlanKind::Training).expect("valid plan");
    let PlanDocument::Training(plan) = plan else {
        panic!("expected a training plan");
    };
    assert_eq!(plan.duration_weeks, 1);
    assert_eq!(plan.weeks[0].days.len(), 2);
    assert!(plan.weeks[0].days[1].rest_day);
}

#[test]
fn test_nutrition_json_parses_for_matching_request() {
    let plan = ResponseParser::parse_for_request(NUTRITION_PLAN_JSON, &nutrition_params())
        .expect("valid plan");
    assert_eq!(plan.kind(), PlanKind::Nutrition);
}

#[test]
fn test_truncated_json_is_rejected() {
    let truncated = &TRAINING_PLAN_JSON[..TRAINING_PLAN_JSON.len() / 2];
    let result = ResponseParser::parse(truncated, PlanKind::Training);
    assert!(result.is_err(), "truncated output produced {result:?}");
}

#[test]
fn test_negative_sets_is_rejected() {
    let raw = TRAINING_PLAN_JSON.replace("\"sets\": 3, \"reps\": 10", "\"sets\": -3, \"reps\": 10");
    assert!(matches!(
        ResponseParser::parse(&raw, PlanKind::Training),
        Err(ParseError::Schema(_))
    ));
}

#[test]
fn test_zero_sets_fails_validation_with_path() {
    let raw = TRAINING_PLAN_JSON.replace("\"sets\": 3, \"reps\": 10", "\"sets\": 0, \"reps\": 10");
    match ResponseParser::parse(&raw, PlanKind::Training) {
        Err(ParseError::Invalid(e)) => assert_eq!(e.path, "weeks[0].days[0].exercises[0].sets"),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn test_macro_ratio_out_of_range_is_rejected() {
    let raw = NUTRITION_PLAN_JSON.replace("\"protein\": 0.3", "\"protein\": 1.3");
    assert!(matches!(
        ResponseParser::parse(&raw, PlanKind::Nutrition),
        Err(ParseError::Invalid(_))
    ));
}

#[test]
fn test_prose_without_json_is_rejected() {
    let raw = "I recommend squatting three times a week and eating more vegetables.";
    assert_eq!(
        ResponseParser::parse(raw, PlanKind::Training),
        Err(ParseError::NoJsonObject)
    );
}

#[test]
fn test_missing_daily_calories_is_rejected() {
    let raw = NUTRITION_PLAN_JSON.replace("\"daily_calories\": 2200,", "");
    assert!(matches!(
        ResponseParser::parse(&raw, PlanKind::Nutrition),
        Err(ParseError::Schema(message)) if message.contains("daily_calories")
    ));
}

#[test]
fn test_fenced_json_after_prose_is_extracted() {
    let raw = format!(
        "Sure! Below is the plan {{with notes}}.\n```json\n{TRAINING_PLAN_JSON}\n```\nGood luck!"
    );
    assert!(ResponseParser::parse(&raw, PlanKind::Training).is_ok());
}

#[test]
fn test_unfenced_json_surrounded_by_prose_is_extracted() {
    let raw = format!("Here you go:\n{NUTRITION_PLAN_JSON}\nEnjoy your meals.");
    assert!(ResponseParser::parse(&raw, PlanKind::Nutrition).is_ok());
}

#[test]
fn test_unfenced_json_after_many_prose_braces_is_extracted() {
    let prose = "Swap {exercise} for {alternative} if needed. ".repeat(40);
    let raw = format!("{prose}\n{TRAINING_PLAN_JSON}");
    assert!(raw.matches('{').count() > 80);
    assert!(ResponseParser::parse(&raw, PlanKind::Training).is_ok());
}

#[test]
fn test_envelope_key_is_unwrapped() {
    let raw = format!("{{\"training_plan\": {TRAINING_PLAN_JSON}}}");
    assert!(ResponseParser::parse(&raw, PlanKind::Training).is_ok());
}

#[test]
fn test_wrong_kind_is_rejected() {
    assert!(ResponseParser::parse(NUTRITION_PLAN_JSON, PlanKind::Training).is_err());
}

#[test]
fn test_length_mismatch_with_request() {
    let result = ResponseParser::parse_for_request(TRAINING_PLAN_JSON, &training_params());
    assert!(result.is_ok());

    let mut params = nutrition_params();
    if let GenerationParams::Nutrition(request) = &mut params {
        request.duration_days = 7;
    }
    assert!(matches!(
        ResponseParser::parse_for_request(NUTRITION_PLAN_JSON, &params),
        Err(ParseError::RequestMismatch(_))
    ));
}
