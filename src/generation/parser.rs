// ABOUTME: Turns untrusted provider text into a validated PlanDocument or a parse failure
// ABOUTME: Strips code fences and prose, isolates the outermost balanced JSON object, then validates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Response Parser
//!
//! Provider output may wrap the plan in prose, markdown fences or a one-key
//! envelope. The parser isolates the JSON object, decodes it into the typed
//! schema for the requested kind and runs structural validation. Any failure
//! rejects the whole document.

use pierre_plan_core::models::{
    GenerationParams, NutritionPlan, PlanDocument, PlanKind, PlanValidationError, TrainingPlan,
};
use std::iter;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Envelope keys some models wrap the plan in
const ENVELOPE_KEYS: &[&str] = &["plan", "training_plan", "nutrition_plan", "data", "result"];

/// Bytes scanned across all candidate object starts in one region
///
/// Each `{` costs the length of the span it was scanned over, so prose full
/// of stray braces is bounded without capping how many are skipped.
const MAX_SCAN_BYTES: usize = 4 * 1024 * 1024;

/// Why provider output could not become a plan
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No balanced JSON object anywhere in the text
    #[error("no JSON object found in provider output")]
    NoJsonObject,
    /// JSON did not decode into the plan schema
    #[error("plan does not match schema: {0}")]
    Schema(String),
    /// Decoded plan failed structural validation
    #[error("plan failed validation: {0}")]
    Invalid(#[from] PlanValidationError),
    /// Plan is valid but does not answer the request
    #[error("plan does not match request: {0}")]
    RequestMismatch(String),
}

/// Parses provider output into plan documents
pub struct ResponseParser;

impl ResponseParser {
    /// Parse raw output for a plan kind
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when no JSON object can be isolated, when it
    /// does not decode into the schema, or when validation fails.
    pub fn parse(raw: &str, kind: PlanKind) -> Result<PlanDocument, ParseError> {
        let object = extract_json_object(raw).ok_or(ParseError::NoJsonObject)?;
        let object = unwrap_envelope(object, kind);

        let document = match kind {
            PlanKind::Training => PlanDocument::Training(decode::<TrainingPlan>(object)?),
            PlanKind::Nutrition => PlanDocument::Nutrition(decode::<NutritionPlan>(object)?),
        };
        document.validate()?;
        Ok(document)
    }

    /// Parse and check the plan answers the request that produced it
    ///
    /// # Errors
    ///
    /// As [`Self::parse`], plus [`ParseError::RequestMismatch`] when the plan
    /// length differs from the requested length.
    pub fn parse_for_request(
        raw: &str,
        params: &GenerationParams,
    ) -> Result<PlanDocument, ParseError> {
        let document = Self::parse(raw, params.kind())?;
        check_against_request(&document, params)?;
        Ok(document)
    }
}

fn decode<T: DeserializeOwned>(object: Value) -> Result<T, ParseError> {
    serde_json::from_value(object).map_err(|e| ParseError::Schema(e.to_string()))
}

fn unwrap_envelope(object: Value, kind: PlanKind) -> Value {
    let Value::Object(map) = object else {
        return object;
    };
    if map.len() != 1 || looks_like_plan(&map, kind) {
        return Value::Object(map);
    }
    match map.into_iter().next() {
        Some((key, inner @ Value::Object(_))) if ENVELOPE_KEYS.contains(&key.as_str()) => inner,
        Some((key, value)) => {
            let mut map = Map::new();
            map.insert(key, value);
            Value::Object(map)
        }
        None => Value::Object(Map::new()),
    }
}

fn looks_like_plan(map: &Map<String, Value>, kind: PlanKind) -> bool {
    match kind {
        PlanKind::Training => map.contains_key("weeks"),
        PlanKind::Nutrition => map.contains_key("days"),
    }
}

fn check_against_request(
    document: &PlanDocument,
    params: &GenerationParams,
) -> Result<(), ParseError> {
    match (document, params) {
        (PlanDocument::Training(plan), GenerationParams::Training(request))
            if plan.duration_weeks != request.duration_weeks =>
        {
            Err(ParseError::RequestMismatch(format!(
                "requested {} weeks, plan has {}",
                request.duration_weeks, plan.duration_weeks
            )))
        }
        (PlanDocument::Nutrition(plan), GenerationParams::Nutrition(request))
            if plan.days.len() != request.duration_days as usize =>
        {
            Err(ParseError::RequestMismatch(format!(
                "requested {} days, plan has {}",
                request.duration_days,
                plan.days.len()
            )))
        }
        _ => Ok(()),
    }
}

/// Isolate the plan object from free text
///
/// Fenced blocks are tried first, then the whole text. Within each region
/// the first `{` whose balanced span decodes as a JSON object wins.
#[must_use]
pub fn extract_json_object(raw: &str) -> Option<Value> {
    fenced_blocks(raw)
        .into_iter()
        .chain(iter::once(raw))
        .find_map(first_object_in)
}

/// Contents of markdown code fences, in order
fn fenced_blocks(raw: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        // Skip the info string (`json`, `JSON`, ...) up to the end of line
        let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
        let body = &after_fence[body_start..];
        let Some(close) = body.find("```") else {
            blocks.push(body);
            break;
        };
        blocks.push(&body[..close]);
        rest = &body[close + 3..];
    }
    blocks
}

fn first_object_in(text: &str) -> Option<Value> {
    let mut budget = MAX_SCAN_BYTES;
    for (start, _) in text.match_indices('{') {
        let rest = &text[start..];
        let span = balanced_end(rest);
        budget = budget.checked_sub(span.unwrap_or(rest.len()))?;
        let Some(len) = span else {
            continue;
        };
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&rest[..len]) {
            return Some(value);
        }
    }
    None
}

/// Byte length of the balanced `{...}` span at the start of `text`
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_end_ignores_braces_in_strings() {
        let text = r#"{"a": "}{", "b": {"c": "\"}"}} trailing"#;
        let end = balanced_end(text);
        assert_eq!(end.map(|e| &text[..e]), Some(r#"{"a": "}{", "b": {"c": "\"}"}}"#));
    }

    #[test]
    fn test_truncated_object_has_no_end() {
        assert_eq!(balanced_end(r#"{"title": "x", "weeks": ["#), None);
    }

    #[test]
    fn test_fenced_block_preferred_over_prose_braces() {
        let raw = "Use {placeholders} wisely.\n```json\n{\"ok\": true}\n```\nDone.";
        assert_eq!(
            extract_json_object(raw),
            Some(serde_json::json!({ "ok": true }))
        );
    }

    #[test]
    fn test_stray_brace_scanning_is_bounded() {
        let raw = format!("{}{{\"ok\": 1}}", "{".repeat(3_000));
        assert_eq!(first_object_in(&raw), None);
        assert_eq!(
            first_object_in("{ {\"ok\": 1}"),
            Some(serde_json::json!({ "ok": 1 }))
        );
    }

    #[test]
    fn test_unclosed_fence_still_scanned() {
        let raw = "```json\n{\"ok\": 1}";
        assert_eq!(extract_json_object(raw), Some(serde_json::json!({ "ok": 1 })));
    }

    #[test]
    fn test_envelope_unwrapped_only_for_known_keys() {
        let wrapped = serde_json::json!({ "training_plan": { "weeks": [] } });
        assert_eq!(
            unwrap_envelope(wrapped, PlanKind::Training),
            serde_json::json!({ "weeks": [] })
        );
        let other = serde_json::json!({ "weeks": [] });
        assert_eq!(unwrap_envelope(other.clone(), PlanKind::Training), other);
    }
}
