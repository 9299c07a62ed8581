// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Generation defaults, task store keys, and plan validation limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped by domain. Runtime-tunable values have their
//! defaults here and are overridden from the environment by the config layer.

/// Generation pipeline defaults
pub mod generation {
    /// Per-attempt provider timeout in seconds
    pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;
    /// Total provider attempts per generation (first call included)
    pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
    /// Delay before the first retry in milliseconds
    pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1_000;
    /// Ceiling for any single inter-attempt delay in milliseconds
    pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
    /// Generations allowed to run concurrently
    pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
    /// Admitted generations allowed to wait for a worker slot
    pub const DEFAULT_MAX_QUEUED_REQUESTS: usize = 50;
    /// Plan save attempts after a successful generation
    pub const DEFAULT_SAVE_RETRY_ATTEMPTS: u32 = 3;
    /// Fixed delay between plan save attempts in milliseconds
    pub const DEFAULT_SAVE_RETRY_DELAY_MS: u64 = 250;
    /// Estimated wall time reported for training plans
    pub const DEFAULT_ESTIMATED_TRAINING_SECS: u64 = 60;
    /// Estimated wall time reported for nutrition plans
    pub const DEFAULT_ESTIMATED_NUTRITION_SECS: u64 = 45;
    /// Timeout for provider connection tests
    pub const DEFAULT_CONNECTION_TEST_TIMEOUT_SECS: u64 = 15;
    /// Max tokens requested by a connection test
    pub const CONNECTION_TEST_MAX_TOKENS: u32 = 16;
    /// Retry hint returned when the generation queue is full
    pub const QUEUE_FULL_RETRY_AFTER_SECS: u64 = 30;
}

/// Progress milestones reported while a task is generating
pub mod progress {
    /// Admitted to the worker pool
    pub const QUEUED: u8 = 5;
    /// Prompt assembled
    pub const PROMPT_BUILT: u8 = 15;
    /// Provider call in flight
    pub const PROVIDER_CALLED: u8 = 25;
    /// Raw provider output received
    pub const RESPONSE_RECEIVED: u8 = 70;
    /// Output parsed and validated
    pub const VALIDATED: u8 = 85;
    /// Plan persisted
    pub const SAVED: u8 = 95;
    /// Terminal
    pub const COMPLETE: u8 = 100;
}

/// Task store defaults and key layout
pub mod tasks {
    /// Task record lifetime in seconds
    pub const DEFAULT_TASK_TTL_SECS: u64 = 1_800;
    /// In-memory sweep interval in seconds
    pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
    /// Redis key prefix for task records
    pub const REDIS_KEY_PREFIX: &str = "pierre:gen_task:";
    /// Random bytes in a task id
    pub const TASK_ID_BYTES: usize = 16;
}

/// Structural limits applied when validating generated plans
pub mod plan_limits {
    /// Longest training plan accepted
    pub const MAX_TRAINING_WEEKS: u32 = 52;
    /// Sets per exercise
    pub const MAX_SETS: u32 = 20;
    /// Reps per set
    pub const MAX_REPS: u32 = 200;
    /// Session or exercise duration
    pub const MAX_DURATION_MINUTES: u32 = 600;
    /// Rest between sets
    pub const MAX_REST_SECONDS: u32 = 1_800;
    /// Days per week
    pub const DAYS_PER_WEEK: u32 = 7;
    /// Longest nutrition plan accepted
    pub const MAX_NUTRITION_DAYS: u32 = 90;
    /// Meals per nutrition day
    pub const MAX_MEALS_PER_DAY: usize = 10;
    /// Daily calorie target floor
    pub const MIN_DAILY_CALORIES: f64 = 800.0;
    /// Daily calorie target ceiling
    pub const MAX_DAILY_CALORIES: f64 = 10_000.0;
    /// Allowed deviation of macro ratios from a sum of 1.0
    pub const MACRO_RATIO_TOLERANCE: f64 = 0.02;
}

/// Provider defaults
pub mod providers {
    /// Default sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    /// Default completion budget
    pub const DEFAULT_MAX_TOKENS: u32 = 4_096;
    /// Temperature upper bound accepted on a config
    pub const MAX_TEMPERATURE: f32 = 2.0;
    /// Completion budget upper bound accepted on a config
    pub const MAX_TOKENS_LIMIT: u32 = 32_768;
}
