// ABOUTME: Tests for the per-vendor circuit breaker state machine
// ABOUTME: Covers tripping on transient failures, fail-fast, recovery probes and isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(missing_docs)]

use std::time::Duration;

use pierre_ai_providers::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakers, CircuitState, ProviderError};
use pierre_plan_core::models::AiProvider;

fn server_error() -> ProviderError {
    ProviderError::ServerError {
        provider: "groq".to_owned(),
        status_code: 503,
    }
}

fn auth_error() -> ProviderError {
    ProviderError::AuthenticationFailed {
        provider: "groq".to_owned(),
    }
}

#[tokio::test]
async fn test_opens_after_threshold_and_fails_fast() {
    let breaker = CircuitBreaker::new(
        AiProvider::Groq,
        CircuitBreakerConfig::new(2, Duration::from_secs(60), 1),
    );

    for _ in 0..2 {
        let result: Result<(), _> = breaker.call(async { Err(server_error()) }).await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let mut polled = false;
    let result: Result<(), _> = breaker
        .call(async {
            polled = true;
            Ok(())
        })
        .await;
    assert!(!polled);
    assert!(matches!(
        result,
        Err(ProviderError::CircuitBreakerOpen { retry_after_secs, .. }) if retry_after_secs > 0
    ));
    assert!(!ProviderError::CircuitBreakerOpen {
        provider: "groq".to_owned(),
        retry_after_secs: 1,
    }
    .is_retryable());
}

#[tokio::test]
async fn test_non_retryable_errors_do_not_trip() {
    let breaker = CircuitBreaker::new(
        AiProvider::OpenAi,
        CircuitBreakerConfig::new(1, Duration::from_secs(60), 1),
    );

    let _: Result<(), _> = breaker.call(async { Err(auth_error()) }).await;
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_recovery_probe_closes_circuit() {
    let breaker = CircuitBreaker::new(
        AiProvider::Anthropic,
        CircuitBreakerConfig::new(1, Duration::ZERO, 1),
    );

    let _: Result<(), _> = breaker.call(async { Err(server_error()) }).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    let probe: Result<u32, _> = breaker.call(async { Ok(7) }).await;
    assert_eq!(probe.ok(), Some(7));
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_failed_probe_reopens() {
    let breaker = CircuitBreaker::new(
        AiProvider::Gemini,
        CircuitBreakerConfig::new(1, Duration::ZERO, 1),
    );

    let _: Result<(), _> = breaker.call(async { Err(server_error()) }).await;
    let _: Result<(), _> = breaker.call(async { Err(server_error()) }).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_breakers_are_isolated_per_vendor() {
    let breakers = CircuitBreakers::new(&CircuitBreakerConfig::new(1, Duration::from_secs(60), 1));

    let _: Result<(), _> = breakers
        .for_provider(AiProvider::Groq)
        .call(async { Err(server_error()) })
        .await;

    assert_eq!(breakers.for_provider(AiProvider::Groq).state(), CircuitState::Open);
    for provider in AiProvider::ALL.into_iter().filter(|p| *p != AiProvider::Groq) {
        assert_eq!(breakers.for_provider(provider).state(), CircuitState::Closed);
    }
}
