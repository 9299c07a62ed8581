// ABOUTME: Runs a single provider call with a per-attempt deadline, retry/backoff and a circuit breaker
// ABOUTME: Classifies provider failures into retryable and terminal and maps them to task failure kinds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Request Executor
//!
//! Every attempt reuses the identical prompt. Transient failures (timeouts,
//! network errors, 5xx, short rate limits) are retried until the task's
//! [`AttemptBudget`] runs out; everything else returns on the first failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pierre_ai_providers::{
    generate_for_kind, CircuitBreakers, PlanPrompt, PlanProvider, ProviderError,
};
use pierre_plan_core::models::FailureKind;
use tokio::time;
use tracing::{debug, instrument, warn};

use crate::config::{GenerationConfig, RetryConfig};

/// Provider attempts available to one task
///
/// Network retries and the one-shot regenerate after unusable output draw
/// from the same budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    max_attempts: u32,
    used: u32,
}

impl AttemptBudget {
    /// Budget of `max_attempts` calls, never less than one
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            used: 0,
        }
    }

    /// Calls made so far
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Calls still allowed
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.used)
    }

    /// Whether another call is allowed
    #[must_use]
    pub const fn has_remaining(&self) -> bool {
        self.used < self.max_attempts
    }

    /// Record one call and return its 1-based number
    fn consume(&mut self) -> u32 {
        self.used = self.used.saturating_add(1);
        self.used
    }
}

/// Wraps provider calls with timeout, retry and breaker policy
#[derive(Clone)]
pub struct RequestExecutor {
    retry: RetryConfig,
    attempt_timeout: Duration,
    breakers: Arc<CircuitBreakers>,
}

impl RequestExecutor {
    /// Create an executor sharing `breakers` with other executors
    #[must_use]
    pub const fn new(
        retry: RetryConfig,
        attempt_timeout: Duration,
        breakers: Arc<CircuitBreakers>,
    ) -> Self {
        Self {
            retry,
            attempt_timeout,
            breakers,
        }
    }

    /// Executor configured from the generation settings, with its own breakers
    #[must_use]
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            config.retry.clone(),
            config.attempt_timeout,
            Arc::new(CircuitBreakers::new(&config.circuit_breaker)),
        )
    }

    /// Budget for a fresh task
    #[must_use]
    pub fn budget(&self) -> AttemptBudget {
        AttemptBudget::new(self.retry.max_attempts)
    }

    /// Breakers guarding each vendor
    #[must_use]
    pub fn breakers(&self) -> &CircuitBreakers {
        &self.breakers
    }

    /// Call the provider until it answers, fails terminally or the budget runs out
    ///
    /// The vendor's breaker is consulted only before a task's first call.
    /// A task that was admitted spends its whole budget even if the breaker
    /// opens meanwhile. Callers check [`AttemptBudget::has_remaining`]
    /// before a follow-up call.
    ///
    /// # Errors
    ///
    /// Returns the last [`ProviderError`] once it is non-retryable or no
    /// attempts remain.
    #[instrument(skip_all, fields(provider = %client.provider(), kind = %prompt.kind))]
    pub async fn execute(
        &self,
        client: &dyn PlanProvider,
        prompt: &PlanPrompt,
        budget: &mut AttemptBudget,
    ) -> Result<String, ProviderError> {
        let breaker = self.breakers.for_provider(client.provider());
        if budget.used() == 0 {
            if let Err(error) = breaker.admit() {
                warn!(error = %error, "Provider circuit open, failing fast");
                return Err(error);
            }
        }

        loop {
            let attempt = budget.consume();
            let started = Instant::now();
            let result = self.attempt(client, prompt).await;
            breaker.record_outcome(&result);
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let error = match result {
                Ok(output) => {
                    debug!(attempt, elapsed_ms, output_len = output.len(), "Provider call succeeded");
                    return Ok(output);
                }
                Err(error) => error,
            };

            let Some(delay) = self.retry_delay(&error, attempt) else {
                warn!(attempt, elapsed_ms, error = %error, "Provider call failed, not retryable");
                return Err(error);
            };
            if !budget.has_remaining() {
                warn!(attempt, elapsed_ms, error = %error, "Provider call failed, attempts exhausted");
                return Err(error);
            }

            warn!(
                attempt,
                elapsed_ms,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Provider call failed, retrying"
            );
            time::sleep(delay).await;
        }
    }

    /// One call bounded by the attempt deadline
    async fn attempt(
        &self,
        client: &dyn PlanProvider,
        prompt: &PlanPrompt,
    ) -> Result<String, ProviderError> {
        match time::timeout(self.attempt_timeout, generate_for_kind(client, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: client.provider().to_string(),
                timeout_ms: u64::try_from(self.attempt_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Wait before the next attempt, or `None` when the error is terminal
    fn retry_delay(&self, error: &ProviderError, failed_attempt: u32) -> Option<Duration> {
        if !error.is_retryable() {
            return None;
        }
        let backoff = self.retry.delay_after(failed_attempt);
        match error {
            ProviderError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => {
                let requested = Duration::from_secs(*secs);
                // Vendor wants us gone for longer than we are prepared to wait
                (requested <= self.retry.max_delay()).then(|| backoff.max(requested))
            }
            _ => Some(backoff),
        }
    }
}

/// Task failure classification for a provider error that ended execution
#[must_use]
pub const fn failure_kind(error: &ProviderError) -> FailureKind {
    match error {
        ProviderError::Timeout { .. }
        | ProviderError::Network { .. }
        | ProviderError::ServerError { .. }
        | ProviderError::RateLimited { .. }
        | ProviderError::CircuitBreakerOpen { .. } => FailureKind::ServiceUnavailable,
        ProviderError::AuthenticationFailed { .. } | ProviderError::InvalidRequest { .. } => {
            FailureKind::ProviderRejected
        }
        ProviderError::InvalidResponse { .. } => FailureKind::OutputInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> RequestExecutor {
        RequestExecutor::new(
            RetryConfig {
                max_delay_ms: 10_000,
                ..RetryConfig::fixed(3, 500)
            },
            Duration::from_secs(5),
            Arc::new(CircuitBreakers::default()),
        )
    }

    fn rate_limited(secs: Option<u64>) -> ProviderError {
        ProviderError::RateLimited {
            provider: "openai".to_owned(),
            retry_after_secs: secs,
        }
    }

    #[test]
    fn test_budget_counts_attempts() {
        let mut budget = AttemptBudget::new(2);
        assert_eq!(budget.consume(), 1);
        assert!(budget.has_remaining());
        assert_eq!(budget.consume(), 2);
        assert!(!budget.has_remaining());
        assert_eq!(budget.remaining(), 0);
        assert_eq!(AttemptBudget::new(0).remaining(), 1);
    }

    #[test]
    fn test_rate_limit_within_max_delay_waits_at_least_retry_after() {
        let delay = executor().retry_delay(&rate_limited(Some(3)), 1);
        assert_eq!(delay, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_rate_limit_beyond_max_delay_is_terminal() {
        assert_eq!(executor().retry_delay(&rate_limited(Some(600)), 1), None);
        assert_eq!(
            executor().retry_delay(&rate_limited(None), 1),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_auth_failure_is_rejected_not_unavailable() {
        let error = ProviderError::AuthenticationFailed {
            provider: "anthropic".to_owned(),
        };
        assert_eq!(executor().retry_delay(&error, 1), None);
        assert_eq!(failure_kind(&error), FailureKind::ProviderRejected);
    }
}
