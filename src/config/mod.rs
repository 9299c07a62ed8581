// ABOUTME: Environment-only configuration for the plan generation subsystem
// ABOUTME: Generation pipeline limits, retry policy, and task store backend selection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration is read from environment variables only. Every value has a
//! default, and unparsable values fall back to it rather than failing startup.

/// Generation pipeline configuration
pub mod generation;
/// Task store backend configuration
pub mod task_store;

use std::env;
use std::str::FromStr;

pub use generation::{BackoffStrategy, GenerationConfig, PersistenceRetryConfig, RetryConfig};
pub use task_store::{TaskStoreBackend, TaskStoreConfig};

/// Read a variable, falling back to `default` when unset
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse a variable, falling back to `default` when unset or malformed
fn env_parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`)
fn env_flag_or(key: &str, default: bool) -> bool {
    match env::var(key).map(|v| v.trim().to_lowercase()).as_deref() {
        Ok("true" | "1" | "yes" | "on") => true,
        Ok("false" | "0" | "no" | "off") => false,
        _ => default,
    }
}
