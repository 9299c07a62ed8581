// ABOUTME: Generation request parameters for training and nutrition plans
// ABOUTME: Cheap synchronous validation run before any task is created
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plan::MacroRatio;
use super::task::PlanKind;
use crate::constants::plan_limits::{
    DAYS_PER_WEEK, MAX_DAILY_CALORIES, MAX_DURATION_MINUTES, MAX_MEALS_PER_DAY,
    MAX_NUTRITION_DAYS, MAX_TRAINING_WEEKS, MIN_DAILY_CALORIES,
};
use crate::errors::{AppError, AppResult};

/// Shortest session a training request may ask for
const MIN_SESSION_MINUTES: u32 = 10;

/// Athlete experience level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    /// New to structured training
    Beginner,
    /// Trains regularly
    Intermediate,
    /// Years of structured training
    Advanced,
}

impl FitnessLevel {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

/// Parameters for a training plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlanRequest {
    /// What the athlete is training for
    pub goal: String,
    /// Experience level
    pub fitness_level: FitnessLevel,
    /// Plan length in weeks
    pub duration_weeks: u32,
    /// Training days per week
    pub days_per_week: u32,
    /// Target session length
    pub session_minutes: u32,
    /// Available equipment
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Body areas or qualities to emphasize
    #[serde(default)]
    pub focus_areas: Vec<String>,
    /// Injuries or movement restrictions
    #[serde(default)]
    pub limitations: Vec<String>,
    /// First day of the plan
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Last day of the plan
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl TrainingPlanRequest {
    /// Reject malformed parameters before a task exists
    ///
    /// # Errors
    ///
    /// Returns a validation `AppError` naming the offending field.
    pub fn validate(&self) -> AppResult<()> {
        if self.goal.trim().is_empty() {
            return Err(AppError::missing_field("goal"));
        }
        check_range("duration_weeks", self.duration_weeks, 1, MAX_TRAINING_WEEKS)?;
        check_range("days_per_week", self.days_per_week, 1, DAYS_PER_WEEK)?;
        check_range(
            "session_minutes",
            self.session_minutes,
            MIN_SESSION_MINUTES,
            MAX_DURATION_MINUTES,
        )?;
        check_date_order(self.start_date, self.end_date)
    }
}

/// Parameters for a nutrition plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionPlanRequest {
    /// Dietary goal (fat loss, maintenance, muscle gain)
    pub goal: String,
    /// Daily energy target; the model picks one when absent
    #[serde(default)]
    pub daily_calories: Option<f64>,
    /// Desired macronutrient split
    #[serde(default)]
    pub macro_ratio: Option<MacroRatio>,
    /// Meals per day
    pub meals_per_day: u32,
    /// Plan length in days
    pub duration_days: u32,
    /// Diet style constraints (vegetarian, halal, low FODMAP)
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    /// Foods that must never appear
    #[serde(default)]
    pub allergies: Vec<String>,
    /// First day of the plan
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Last day of the plan
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl NutritionPlanRequest {
    /// Reject malformed parameters before a task exists
    ///
    /// # Errors
    ///
    /// Returns a validation `AppError` naming the offending field.
    pub fn validate(&self) -> AppResult<()> {
        if self.goal.trim().is_empty() {
            return Err(AppError::missing_field("goal"));
        }
        if let Some(calories) = self.daily_calories {
            if !calories.is_finite() || !(MIN_DAILY_CALORIES..=MAX_DAILY_CALORIES).contains(&calories)
            {
                return Err(AppError::out_of_range(
                    "daily_calories",
                    format!("must be within {MIN_DAILY_CALORIES}..={MAX_DAILY_CALORIES}"),
                ));
            }
        }
        if let Some(ratio) = &self.macro_ratio {
            ratio
                .validate("macro_ratio")
                .map_err(|e| AppError::out_of_range(&e.path, e.reason))?;
        }
        check_range(
            "meals_per_day",
            self.meals_per_day,
            1,
            u32::try_from(MAX_MEALS_PER_DAY).unwrap_or(u32::MAX),
        )?;
        check_range("duration_days", self.duration_days, 1, MAX_NUTRITION_DAYS)?;
        check_date_order(self.start_date, self.end_date)
    }
}

/// Parameters of either plan kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationParams {
    /// Training plan parameters
    Training(TrainingPlanRequest),
    /// Nutrition plan parameters
    Nutrition(NutritionPlanRequest),
}

impl GenerationParams {
    /// Plan kind these parameters produce
    #[must_use]
    pub const fn kind(&self) -> PlanKind {
        match self {
            Self::Training(_) => PlanKind::Training,
            Self::Nutrition(_) => PlanKind::Nutrition,
        }
    }

    /// Run the kind-specific synchronous checks
    ///
    /// # Errors
    ///
    /// Returns a validation `AppError` naming the offending field.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            Self::Training(params) => params.validate(),
            Self::Nutrition(params) => params.validate(),
        }
    }
}

/// Start-generation input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Plan parameters, tagged by kind
    #[serde(flatten)]
    pub params: GenerationParams,
    /// Explicit provider config; the owner's default when absent
    #[serde(default)]
    pub provider_config_id: Option<Uuid>,
}

impl GenerationRequest {
    /// Request using the owner's default provider
    #[must_use]
    pub const fn new(params: GenerationParams) -> Self {
        Self {
            params,
            provider_config_id: None,
        }
    }

    /// Select a specific provider config
    #[must_use]
    pub const fn with_provider_config(mut self, config_id: Uuid) -> Self {
        self.provider_config_id = Some(config_id);
        self
    }
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> AppResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(AppError::out_of_range(
            field,
            format!("{value} must be within {min}..={max}"),
        ))
    }
}

fn check_date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(AppError::invalid_input(format!(
            "end_date {end} is before start_date {start}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn nutrition(ratio: Option<MacroRatio>) -> NutritionPlanRequest {
        NutritionPlanRequest {
            goal: "maintenance".to_owned(),
            daily_calories: Some(2_200.0),
            macro_ratio: ratio,
            meals_per_day: 3,
            duration_days: 7,
            dietary_restrictions: vec![],
            allergies: vec![],
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn test_ratio_sum_checked_synchronously() {
        let bad = nutrition(Some(MacroRatio {
            protein: 0.5,
            carbs: 0.5,
            fat: 0.5,
        }));
        let err = bad.validate().err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::ValueOutOfRange));
        assert!(nutrition(None).validate().is_ok());
    }

    #[test]
    fn test_date_order_checked() {
        let mut request = nutrition(None);
        request.start_date = NaiveDate::from_ymd_opt(2025, 3, 10);
        request.end_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        let err = request.validate().err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidInput));
    }

    #[test]
    fn test_request_deserializes_with_kind_tag() -> Result<(), serde_json::Error> {
        let request: GenerationRequest = serde_json::from_value(serde_json::json!({
            "kind": "training",
            "goal": "first 10k",
            "fitness_level": "beginner",
            "duration_weeks": 4,
            "days_per_week": 3,
            "session_minutes": 40
        }))?;
        assert_eq!(request.params.kind(), PlanKind::Training);
        assert!(request.provider_config_id.is_none());
        Ok(())
    }
}
