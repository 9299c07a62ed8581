// ABOUTME: Task store backend selection (in-memory or Redis) from environment
// ABOUTME: Redis URL, key prefix and in-memory sweep interval
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::env;
use std::time::Duration;

use pierre_plan_core::constants::tasks;
use pierre_plan_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use super::{env_parse_or, env_var_or};

/// Where task records live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum TaskStoreBackend {
    /// Process-local map; tasks vanish on restart
    Memory,
    /// Shared Redis instance
    Redis {
        /// Connection URL (`redis://` or `rediss://`)
        url: String,
    },
}

/// Task store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStoreConfig {
    /// Selected backend
    pub backend: TaskStoreBackend,
    /// Prefix for Redis keys
    pub key_prefix: String,
    /// How often the in-memory store sweeps expired records
    pub cleanup_interval_secs: u64,
}

impl Default for TaskStoreConfig {
    fn default() -> Self {
        Self {
            backend: TaskStoreBackend::Memory,
            key_prefix: tasks::REDIS_KEY_PREFIX.to_owned(),
            cleanup_interval_secs: tasks::DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl TaskStoreConfig {
    /// Load task store configuration from environment
    ///
    /// # Errors
    ///
    /// Returns an error when `PIERRE_TASK_STORE=redis` but `REDIS_URL` is not
    /// set, or when the backend name is unknown.
    pub fn from_env() -> AppResult<Self> {
        let backend = match env_var_or("PIERRE_TASK_STORE", "memory")
            .trim()
            .to_lowercase()
            .as_str()
        {
            "memory" => TaskStoreBackend::Memory,
            "redis" => {
                let url = env::var("REDIS_URL")
                    .map_err(|_| AppError::config_missing("REDIS_URL"))?;
                TaskStoreBackend::Redis { url }
            }
            other => {
                return Err(AppError::config(format!(
                    "unknown task store backend '{other}' (expected memory or redis)"
                )))
            }
        };

        Ok(Self {
            backend,
            key_prefix: env_var_or("PIERRE_TASK_KEY_PREFIX", tasks::REDIS_KEY_PREFIX),
            cleanup_interval_secs: env_parse_or(
                "PIERRE_TASK_CLEANUP_INTERVAL_SECS",
                tasks::DEFAULT_CLEANUP_INTERVAL_SECS,
            )
            .max(1),
        })
    }

    /// Interval between in-memory sweeps
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
