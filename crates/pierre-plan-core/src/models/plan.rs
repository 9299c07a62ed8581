// ABOUTME: Strict schema for generated training and nutrition plan documents
// ABOUTME: Structural validation rejects any out-of-range or inconsistent field as a whole
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Plan Documents
//!
//! A [`PlanDocument`] is only ever built from provider output that decoded
//! into these types and then passed [`PlanDocument::validate`]. There is no
//! partially-valid plan: the first violation rejects the whole document.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::task::PlanKind;
use crate::constants::plan_limits::{
    DAYS_PER_WEEK, MACRO_RATIO_TOLERANCE, MAX_DAILY_CALORIES, MAX_DURATION_MINUTES,
    MAX_MEALS_PER_DAY, MAX_NUTRITION_DAYS, MAX_REPS, MAX_REST_SECONDS, MAX_SETS,
    MAX_TRAINING_WEEKS, MIN_DAILY_CALORIES,
};

/// First structural violation found in a plan
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct PlanValidationError {
    /// Dotted path of the offending field (`weeks[0].days[2].exercises[1].sets`)
    pub path: String,
    /// What is wrong with it
    pub reason: String,
}

impl PlanValidationError {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

type ValidationResult = Result<(), PlanValidationError>;

/// Validated structured output of a successful generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "plan", rename_all = "snake_case")]
pub enum PlanDocument {
    /// Weeks, then days, then exercises
    Training(TrainingPlan),
    /// Days, then meals, then food items
    Nutrition(NutritionPlan),
}

impl PlanDocument {
    /// Plan kind of this document
    #[must_use]
    pub const fn kind(&self) -> PlanKind {
        match self {
            Self::Training(_) => PlanKind::Training,
            Self::Nutrition(_) => PlanKind::Nutrition,
        }
    }

    /// Check every field against the schema limits
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> ValidationResult {
        match self {
            Self::Training(plan) => plan.validate(),
            Self::Nutrition(plan) => plan.validate(),
        }
    }
}

/// Multi-week training schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlan {
    /// Display title
    pub title: String,
    /// Number of weeks; must equal `weeks.len()`
    pub duration_weeks: u32,
    /// Weekly schedules in order
    pub weeks: Vec<TrainingWeek>,
    /// Free-form coaching notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One week of a training plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingWeek {
    /// 1-based, sequential
    pub week_number: u32,
    /// Theme of the week
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    /// Training days of the week
    pub days: Vec<TrainingDay>,
}

/// One day of a training week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDay {
    /// 1-7, unique within the week
    pub day_number: u32,
    /// Session name
    pub name: String,
    /// Rest days carry no exercises
    #[serde(default)]
    pub rest_day: bool,
    /// Planned session length
    #[serde(default)]
    pub duration_minutes: u32,
    /// Exercises in order
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

/// One exercise prescription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Exercise name
    pub name: String,
    /// Working sets, at least one
    pub sets: u32,
    /// Reps per set, for rep-based work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    /// Duration, for time-based work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// Rest between sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
    /// Intensity or load guidance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TrainingPlan {
    fn validate(&self) -> ValidationResult {
        require_text("title", &self.title)?;
        in_range("duration_weeks", self.duration_weeks, 1, MAX_TRAINING_WEEKS)?;
        if self.weeks.len() != self.duration_weeks as usize {
            return Err(PlanValidationError::new(
                "weeks",
                format!(
                    "expected {} weeks, found {}",
                    self.duration_weeks,
                    self.weeks.len()
                ),
            ));
        }

        for (index, week) in self.weeks.iter().enumerate() {
            let path = format!("weeks[{index}]");
            let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if week.week_number != expected {
                return Err(PlanValidationError::new(
                    format!("{path}.week_number"),
                    format!("expected {expected}, found {}", week.week_number),
                ));
            }
            week.validate(&path)?;
        }
        Ok(())
    }
}

impl TrainingWeek {
    fn validate(&self, path: &str) -> ValidationResult {
        if self.days.is_empty() {
            return Err(PlanValidationError::new(
                format!("{path}.days"),
                "week has no days",
            ));
        }
        if self.days.len() > DAYS_PER_WEEK as usize {
            return Err(PlanValidationError::new(
                format!("{path}.days"),
                format!("more than {DAYS_PER_WEEK} days"),
            ));
        }

        let mut seen = HashSet::new();
        for (index, day) in self.days.iter().enumerate() {
            let day_path = format!("{path}.days[{index}]");
            in_range(
                &format!("{day_path}.day_number"),
                day.day_number,
                1,
                DAYS_PER_WEEK,
            )?;
            if !seen.insert(day.day_number) {
                return Err(PlanValidationError::new(
                    format!("{day_path}.day_number"),
                    format!("day {} appears twice", day.day_number),
                ));
            }
            day.validate(&day_path)?;
        }
        Ok(())
    }
}

impl TrainingDay {
    fn validate(&self, path: &str) -> ValidationResult {
        require_text(&format!("{path}.name"), &self.name)?;
        if self.rest_day {
            return Ok(());
        }

        in_range(
            &format!("{path}.duration_minutes"),
            self.duration_minutes,
            1,
            MAX_DURATION_MINUTES,
        )?;
        if self.exercises.is_empty() {
            return Err(PlanValidationError::new(
                format!("{path}.exercises"),
                "training day has no exercises",
            ));
        }
        for (index, exercise) in self.exercises.iter().enumerate() {
            exercise.validate(&format!("{path}.exercises[{index}]"))?;
        }
        Ok(())
    }
}

impl Exercise {
    fn validate(&self, path: &str) -> ValidationResult {
        require_text(&format!("{path}.name"), &self.name)?;
        in_range(&format!("{path}.sets"), self.sets, 1, MAX_SETS)?;

        match (self.reps, self.duration_minutes) {
            (None, None) => {
                return Err(PlanValidationError::new(
                    path,
                    "exercise needs reps or duration_minutes",
                ));
            }
            (reps, duration) => {
                if let Some(reps) = reps {
                    in_range(&format!("{path}.reps"), reps, 1, MAX_REPS)?;
                }
                if let Some(duration) = duration {
                    in_range(
                        &format!("{path}.duration_minutes"),
                        duration,
                        1,
                        MAX_DURATION_MINUTES,
                    )?;
                }
            }
        }

        if let Some(rest) = self.rest_seconds {
            in_range(&format!("{path}.rest_seconds"), rest, 0, MAX_REST_SECONDS)?;
        }
        Ok(())
    }
}

/// Share of daily energy from each macronutrient; components sum to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroRatio {
    /// Protein fraction, 0-1
    pub protein: f64,
    /// Carbohydrate fraction, 0-1
    pub carbs: f64,
    /// Fat fraction, 0-1
    pub fat: f64,
}

impl MacroRatio {
    /// Check component bounds and the sum
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range component, or a sum error.
    pub fn validate(&self, path: &str) -> ValidationResult {
        for (name, value) in [
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(PlanValidationError::new(
                    format!("{path}.{name}"),
                    format!("{value} is outside 0..=1"),
                ));
            }
        }

        let sum = self.protein + self.carbs + self.fat;
        if (sum - 1.0).abs() > MACRO_RATIO_TOLERANCE {
            return Err(PlanValidationError::new(
                path,
                format!("ratios sum to {sum:.3}, expected 1.0"),
            ));
        }
        Ok(())
    }
}

/// Type of meal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    /// Breakfast meal
    Breakfast,
    /// Lunch meal
    Lunch,
    /// Dinner meal
    Dinner,
    /// Snack between meals
    Snack,
    /// Anything the model labels otherwise
    #[serde(other)]
    Other,
}

/// Multi-day meal schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionPlan {
    /// Display title
    pub title: String,
    /// Daily energy target
    pub daily_calories: f64,
    /// Macronutrient split
    pub macro_ratio: MacroRatio,
    /// Daily schedules in order
    pub days: Vec<NutritionDay>,
    /// Free-form guidance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One day of a nutrition plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionDay {
    /// 1-based, sequential
    pub day_number: u32,
    /// Meals of the day
    pub meals: Vec<Meal>,
}

/// One meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Meal slot
    pub meal_type: MealType,
    /// Meal name
    pub name: String,
    /// Foods in the meal
    pub items: Vec<FoodItem>,
}

/// One food portion with its macros
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    /// Food name
    pub name: String,
    /// Portion amount, positive
    pub quantity: f64,
    /// Portion unit (g, ml, cup, piece)
    pub unit: String,
    /// Energy of the portion
    pub calories: f64,
    /// Protein in grams
    pub protein_g: f64,
    /// Carbohydrates in grams
    pub carbs_g: f64,
    /// Fat in grams
    pub fat_g: f64,
}

impl NutritionPlan {
    fn validate(&self) -> ValidationResult {
        require_text("title", &self.title)?;
        if !self.daily_calories.is_finite()
            || !(MIN_DAILY_CALORIES..=MAX_DAILY_CALORIES).contains(&self.daily_calories)
        {
            return Err(PlanValidationError::new(
                "daily_calories",
                format!(
                    "{} is outside {MIN_DAILY_CALORIES}..={MAX_DAILY_CALORIES}",
                    self.daily_calories
                ),
            ));
        }
        self.macro_ratio.validate("macro_ratio")?;

        if self.days.is_empty() {
            return Err(PlanValidationError::new("days", "plan has no days"));
        }
        if self.days.len() > MAX_NUTRITION_DAYS as usize {
            return Err(PlanValidationError::new(
                "days",
                format!("more than {MAX_NUTRITION_DAYS} days"),
            ));
        }

        for (index, day) in self.days.iter().enumerate() {
            let path = format!("days[{index}]");
            let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if day.day_number != expected {
                return Err(PlanValidationError::new(
                    format!("{path}.day_number"),
                    format!("expected {expected}, found {}", day.day_number),
                ));
            }
            if day.meals.is_empty() || day.meals.len() > MAX_MEALS_PER_DAY {
                return Err(PlanValidationError::new(
                    format!("{path}.meals"),
                    format!("expected 1..={MAX_MEALS_PER_DAY} meals, found {}", day.meals.len()),
                ));
            }
            for (meal_index, meal) in day.meals.iter().enumerate() {
                meal.validate(&format!("{path}.meals[{meal_index}]"))?;
            }
        }
        Ok(())
    }
}

impl Meal {
    fn validate(&self, path: &str) -> ValidationResult {
        require_text(&format!("{path}.name"), &self.name)?;
        if self.items.is_empty() {
            return Err(PlanValidationError::new(
                format!("{path}.items"),
                "meal has no food items",
            ));
        }
        for (index, item) in self.items.iter().enumerate() {
            item.validate(&format!("{path}.items[{index}]"))?;
        }
        Ok(())
    }
}

impl FoodItem {
    fn validate(&self, path: &str) -> ValidationResult {
        require_text(&format!("{path}.name"), &self.name)?;
        require_text(&format!("{path}.unit"), &self.unit)?;
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(PlanValidationError::new(
                format!("{path}.quantity"),
                format!("{} must be positive", self.quantity),
            ));
        }
        for (name, value) in [
            ("calories", self.calories),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fat_g", self.fat_g),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PlanValidationError::new(
                    format!("{path}.{name}"),
                    format!("{value} must be non-negative"),
                ));
            }
        }
        Ok(())
    }
}

fn require_text(path: &str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(PlanValidationError::new(path, "must not be empty"));
    }
    Ok(())
}

fn in_range(path: &str, value: u32, min: u32, max: u32) -> ValidationResult {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(PlanValidationError::new(
            path,
            format!("{value} is outside {min}..={max}"),
        ))
    }
}
