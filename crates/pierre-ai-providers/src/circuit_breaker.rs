// ABOUTME: Per-vendor circuit breaker guarding AI provider calls
// ABOUTME: Trips on repeated transient failures and fails fast until a recovery probe succeeds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use pierre_plan_core::models::AiProvider;
use tracing::{info, warn};

use crate::errors::ProviderError;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Tripped, calls fail immediately
    Open,
    /// One recovery probe in flight
    HalfOpen,
}

impl CircuitState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Closed,
            1 => Self::Open,
            _ => Self::HalfOpen,
        }
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

/// Thresholds for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures before opening
    pub failure_threshold: u32,
    /// Time open before a recovery probe is allowed
    pub recovery_timeout: Duration,
    /// Probe successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker configuration
    #[must_use]
    pub const fn new(
        failure_threshold: u32,
        recovery_timeout: Duration,
        success_threshold: u32,
    ) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            success_threshold,
        }
    }
}

/// Lock-free circuit breaker for one vendor
///
/// Only retryable failures count toward tripping: a rejected credential
/// says nothing about the vendor's health.
pub struct CircuitBreaker {
    provider: AiProvider,
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    /// Millis since `start_instant` when the circuit last opened
    opened_at_ms: AtomicU64,
    config: CircuitBreakerConfig,
    start_instant: Instant,
}

impl CircuitBreaker {
    /// Create a breaker for a vendor
    #[must_use]
    pub fn new(provider: AiProvider, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            state: AtomicU8::new(CircuitState::Closed.to_u8()),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            config,
            start_instant: Instant::now(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Consecutive failures recorded while closed
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    fn is_allowed(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => self.try_half_open(),
            CircuitState::HalfOpen => false,
        }
    }

    fn try_half_open(&self) -> bool {
        let recovery_ms = u64::try_from(self.config.recovery_timeout.as_millis()).unwrap_or(u64::MAX);
        let since_open = self
            .elapsed_millis()
            .saturating_sub(self.opened_at_ms.load(Ordering::SeqCst));
        if since_open < recovery_ms {
            return false;
        }

        let swapped = self
            .state
            .compare_exchange(
                CircuitState::Open.to_u8(),
                CircuitState::HalfOpen.to_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if swapped {
            info!(provider = %self.provider, "Circuit breaker half-open, sending recovery probe");
        }
        swapped
    }

    fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.start_instant.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn open(&self) {
        self.state
            .store(CircuitState::Open.to_u8(), Ordering::SeqCst);
        self.opened_at_ms
            .store(self.elapsed_millis(), Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
    }

    /// Record a successful call
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => self.failure_count.store(0, Ordering::SeqCst),
            CircuitState::HalfOpen => {
                let count = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= self.config.success_threshold {
                    self.state
                        .store(CircuitState::Closed.to_u8(), Ordering::SeqCst);
                    self.failure_count.store(0, Ordering::SeqCst);
                    self.success_count.store(0, Ordering::SeqCst);
                    info!(provider = %self.provider, "Circuit breaker closed, provider recovered");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a transient failure
    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= self.config.failure_threshold {
                    self.open();
                    warn!(
                        provider = %self.provider,
                        failures = count,
                        recovery_timeout_secs = self.config.recovery_timeout.as_secs(),
                        "Circuit breaker opened, provider failing"
                    );
                }
            }
            CircuitState::HalfOpen => {
                self.open();
                warn!(provider = %self.provider, "Circuit breaker re-opened, recovery probe failed");
            }
            CircuitState::Open => self
                .opened_at_ms
                .store(self.elapsed_millis(), Ordering::SeqCst),
        }
    }

    /// Ask to start calling the vendor
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::CircuitBreakerOpen` while the circuit is open
    /// or a recovery probe is already in flight.
    pub fn admit(&self) -> Result<(), ProviderError> {
        if self.is_allowed() {
            return Ok(());
        }
        Err(ProviderError::CircuitBreakerOpen {
            provider: self.provider.to_string(),
            retry_after_secs: self.secs_until_recovery(),
        })
    }

    /// Count the outcome of a call made after [`Self::admit`]
    pub fn record_outcome<T>(&self, result: &Result<T, ProviderError>) {
        match result {
            Ok(_) => self.record_success(),
            Err(error) if error.is_retryable() => self.record_failure(),
            // A non-transient answer still proves the vendor is reachable
            Err(_) => self.record_success(),
        }
    }

    /// Run a provider call under breaker protection
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::CircuitBreakerOpen` without polling `operation`
    /// while the circuit is open, otherwise the operation's own error.
    pub async fn call<F, T>(&self, operation: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        self.admit()?;
        let result = operation.await;
        self.record_outcome(&result);
        result
    }

    fn secs_until_recovery(&self) -> u64 {
        let recovery_ms = u64::try_from(self.config.recovery_timeout.as_millis()).unwrap_or(u64::MAX);
        let since_open = self
            .elapsed_millis()
            .saturating_sub(self.opened_at_ms.load(Ordering::SeqCst));
        recovery_ms.saturating_sub(since_open).saturating_add(999) / 1000
    }

    /// Force the breaker closed
    pub fn reset(&self) {
        self.state
            .store(CircuitState::Closed.to_u8(), Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
        info!(provider = %self.provider, "Circuit breaker manually reset");
    }
}

/// One breaker per vendor, built once for the closed vendor set
pub struct CircuitBreakers {
    breakers: [CircuitBreaker; AiProvider::ALL.len()],
}

impl CircuitBreakers {
    /// Build breakers for every vendor with a shared configuration
    #[must_use]
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            breakers: AiProvider::ALL.map(|provider| CircuitBreaker::new(provider, config.clone())),
        }
    }

    /// Breaker for a vendor
    #[must_use]
    pub const fn for_provider(&self, provider: AiProvider) -> &CircuitBreaker {
        let slot = match provider {
            AiProvider::OpenAi => 0,
            AiProvider::Anthropic => 1,
            AiProvider::Gemini => 2,
            AiProvider::Groq => 3,
            AiProvider::DeepSeek => 4,
            AiProvider::Local => 5,
        };
        &self.breakers[slot]
    }
}

impl Default for CircuitBreakers {
    fn default() -> Self {
        Self::new(&CircuitBreakerConfig::default())
    }
}
