// ABOUTME: Generation pipeline configuration: attempt timeout, retry policy, pool limits
// ABOUTME: Also persistence retry, task TTL, estimated durations and circuit breaker thresholds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use pierre_ai_providers::CircuitBreakerConfig;
use pierre_plan_core::constants::{generation, tasks};
use pierre_plan_core::errors::{AppError, AppResult};
use pierre_plan_core::models::PlanKind;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{env_flag_or, env_parse_or, env_var_or};

/// Jitter adds up to this fraction of the computed delay
const JITTER_FRACTION: f64 = 0.1;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,
    /// Delay doubles after every retry, capped at the maximum
    Exponential,
}

impl BackoffStrategy {
    /// Parse from string, defaulting to exponential
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "constant" => Self::Fixed,
            _ => Self::Exponential,
        }
    }
}

/// Retry policy for provider calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per task, first call included
    pub max_attempts: u32,
    /// Delay growth strategy
    pub backoff: BackoffStrategy,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds
    pub max_delay_ms: u64,
    /// Randomize delays to spread retries from concurrent tasks
    pub jitter_enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: generation::DEFAULT_RETRY_ATTEMPTS,
            backoff: BackoffStrategy::Exponential,
            initial_delay_ms: generation::DEFAULT_RETRY_INITIAL_DELAY_MS,
            max_delay_ms: generation::DEFAULT_RETRY_MAX_DELAY_MS,
            jitter_enabled: true,
        }
    }
}

impl RetryConfig {
    /// Load retry configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_parse_or("PIERRE_AI_RETRY_ATTEMPTS", defaults.max_attempts),
            backoff: BackoffStrategy::from_str_or_default(&env_var_or(
                "PIERRE_AI_RETRY_BACKOFF",
                "exponential",
            )),
            initial_delay_ms: env_parse_or(
                "PIERRE_AI_RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay_ms,
            ),
            max_delay_ms: env_parse_or("PIERRE_AI_RETRY_MAX_DELAY_MS", defaults.max_delay_ms),
            jitter_enabled: env_flag_or("PIERRE_AI_RETRY_JITTER", defaults.jitter_enabled),
        }
    }

    /// Fixed delay without jitter
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Fixed,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            jitter_enabled: false,
        }
    }

    /// Upper bound on any single delay
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay to wait after the `failed_attempt`-th attempt (1-based) failed
    #[must_use]
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let base = match self.backoff {
            BackoffStrategy::Fixed => self.initial_delay_ms,
            BackoffStrategy::Exponential => {
                let exponent = failed_attempt.saturating_sub(1).min(16);
                self.initial_delay_ms.saturating_mul(1_u64 << exponent)
            }
        };
        let capped = base.min(self.max_delay_ms);

        if !self.jitter_enabled || capped == 0 {
            return Duration::from_millis(capped);
        }
        let spread = (capped as f64 * JITTER_FRACTION) as u64;
        let jitter = rand::thread_rng().gen_range(0..=spread);
        Duration::from_millis(capped.saturating_add(jitter).min(self.max_delay_ms))
    }

    /// Worst-case time spent across every attempt and delay
    #[must_use]
    pub fn worst_case(&self, attempt_timeout: Duration) -> Duration {
        let sleeps: Duration = (1..self.max_attempts)
            .map(|n| {
                let base = match self.backoff {
                    BackoffStrategy::Fixed => self.initial_delay_ms,
                    BackoffStrategy::Exponential => self
                        .initial_delay_ms
                        .saturating_mul(1_u64 << n.saturating_sub(1).min(16)),
                };
                Duration::from_millis(base.min(self.max_delay_ms))
            })
            .sum();
        attempt_timeout.saturating_mul(self.max_attempts) + sleeps
    }
}

/// Retry policy for saving a finished plan, independent of the generation budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceRetryConfig {
    /// Total save attempts
    pub max_attempts: u32,
    /// Fixed delay between save attempts in milliseconds
    pub delay_ms: u64,
}

impl Default for PersistenceRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: generation::DEFAULT_SAVE_RETRY_ATTEMPTS,
            delay_ms: generation::DEFAULT_SAVE_RETRY_DELAY_MS,
        }
    }
}

impl PersistenceRetryConfig {
    /// Load persistence retry configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_parse_or("PIERRE_AI_SAVE_RETRY_ATTEMPTS", defaults.max_attempts),
            delay_ms: env_parse_or("PIERRE_AI_SAVE_RETRY_DELAY_MS", defaults.delay_ms),
        }
    }

    /// Delay between save attempts
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Generation pipeline configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Hard deadline for a single provider call
    pub attempt_timeout: Duration,
    /// Retry policy shared by transient failures and the parse-failure regenerate
    pub retry: RetryConfig,
    /// Generations running at once across the process
    pub max_concurrent_requests: usize,
    /// Admitted generations allowed to wait for a running slot
    pub max_queued_requests: usize,
    /// How long task records stay pollable
    pub task_ttl: Duration,
    /// Regenerate once with a stricter instruction when output fails validation
    pub regenerate_on_parse_failure: bool,
    /// Save retry policy
    pub persistence: PersistenceRetryConfig,
    /// Estimate returned to callers starting a training plan
    pub estimated_training_secs: u64,
    /// Estimate returned to callers starting a nutrition plan
    pub estimated_nutrition_secs: u64,
    /// Deadline for a provider connection test
    pub connection_test_timeout: Duration,
    /// Per-vendor circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(generation::DEFAULT_ATTEMPT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
            max_concurrent_requests: generation::DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_queued_requests: generation::DEFAULT_MAX_QUEUED_REQUESTS,
            task_ttl: Duration::from_secs(tasks::DEFAULT_TASK_TTL_SECS),
            regenerate_on_parse_failure: true,
            persistence: PersistenceRetryConfig::default(),
            estimated_training_secs: generation::DEFAULT_ESTIMATED_TRAINING_SECS,
            estimated_nutrition_secs: generation::DEFAULT_ESTIMATED_NUTRITION_SECS,
            connection_test_timeout: Duration::from_secs(
                generation::DEFAULT_CONNECTION_TEST_TIMEOUT_SECS,
            ),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl GenerationConfig {
    /// Load generation configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let breaker = CircuitBreakerConfig::new(
            env_parse_or(
                "PIERRE_AI_CIRCUIT_FAILURE_THRESHOLD",
                defaults.circuit_breaker.failure_threshold,
            ),
            Duration::from_secs(env_parse_or(
                "PIERRE_AI_CIRCUIT_RECOVERY_SECS",
                defaults.circuit_breaker.recovery_timeout.as_secs(),
            )),
            defaults.circuit_breaker.success_threshold,
        );

        Self {
            attempt_timeout: Duration::from_secs(env_parse_or(
                "PIERRE_AI_TIMEOUT_SECS",
                generation::DEFAULT_ATTEMPT_TIMEOUT_SECS,
            )),
            retry: RetryConfig::from_env(),
            max_concurrent_requests: env_parse_or(
                "PIERRE_AI_MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            max_queued_requests: env_parse_or(
                "PIERRE_AI_MAX_QUEUED_REQUESTS",
                defaults.max_queued_requests,
            ),
            task_ttl: Duration::from_secs(env_parse_or(
                "PIERRE_AI_TASK_TTL_SECS",
                tasks::DEFAULT_TASK_TTL_SECS,
            )),
            regenerate_on_parse_failure: env_flag_or(
                "PIERRE_AI_REGENERATE_ON_PARSE_FAILURE",
                defaults.regenerate_on_parse_failure,
            ),
            persistence: PersistenceRetryConfig::from_env(),
            estimated_training_secs: env_parse_or(
                "PIERRE_AI_ESTIMATED_TRAINING_SECS",
                defaults.estimated_training_secs,
            ),
            estimated_nutrition_secs: env_parse_or(
                "PIERRE_AI_ESTIMATED_NUTRITION_SECS",
                defaults.estimated_nutrition_secs,
            ),
            connection_test_timeout: Duration::from_secs(env_parse_or(
                "PIERRE_AI_CONNECTION_TEST_TIMEOUT_SECS",
                generation::DEFAULT_CONNECTION_TEST_TIMEOUT_SECS,
            )),
            circuit_breaker: breaker,
        }
    }

    /// Admission capacity: running plus queued
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_concurrent_requests
            .saturating_add(self.max_queued_requests)
    }

    /// Estimated wall time reported when a task starts
    #[must_use]
    pub const fn estimated_secs(&self, kind: PlanKind) -> u64 {
        match kind {
            PlanKind::Training => self.estimated_training_secs,
            PlanKind::Nutrition => self.estimated_nutrition_secs,
        }
    }

    /// Shortest TTL that keeps the last admitted task visible until it finishes
    ///
    /// That task waits behind `ceil(capacity / max_concurrent_requests) - 1`
    /// full rounds of worst-case generations before running its own.
    #[must_use]
    pub fn required_task_ttl(&self) -> Duration {
        let workers = self.max_concurrent_requests.max(1);
        let rounds = self.capacity().div_ceil(workers);
        let rounds = u32::try_from(rounds).unwrap_or(u32::MAX);
        self.retry
            .worst_case(self.attempt_timeout)
            .saturating_mul(rounds)
    }

    /// Check the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns a configuration error for zero attempts, zero concurrency or a
    /// zero attempt timeout. A breaker threshold below the attempt count is
    /// rejected, as is a task TTL below [`Self::required_task_ttl`].
    pub fn validate(&self) -> AppResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("retry.max_attempts must be at least 1"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(AppError::config(
                "max_concurrent_requests must be at least 1",
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(AppError::config("attempt_timeout must be non-zero"));
        }
        if self.persistence.max_attempts == 0 {
            return Err(AppError::config(
                "persistence.max_attempts must be at least 1",
            ));
        }
        if self.circuit_breaker.failure_threshold < self.retry.max_attempts {
            return Err(AppError::config(format!(
                "circuit_breaker.failure_threshold ({}) must be at least retry.max_attempts ({})",
                self.circuit_breaker.failure_threshold, self.retry.max_attempts
            )));
        }
        let required = self.required_task_ttl();
        if self.task_ttl < required {
            return Err(AppError::config(format!(
                "task_ttl ({}s) is shorter than the worst-case time for the last queued task ({}s)",
                self.task_ttl.as_secs(),
                required.as_secs()
            )));
        }
        Ok(())
    }
}
