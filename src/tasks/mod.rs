// ABOUTME: TaskStore contract for generation task records with write-once terminal states
// ABOUTME: In-memory (DashMap) and Redis (Lua compare-and-set) implementations plus a factory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Task Store
//!
//! Task records are ephemeral: they expire by TTL and are never deleted
//! explicitly. Every transition is a single atomic compare-and-set against
//! `status = generating`, so once a record is `completed` or `failed` no
//! later call can change its status, result reference or message.

/// Process-local store
pub mod memory;
/// Redis-backed store shared across instances
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pierre_plan_core::errors::{AppError, AppResult};
use pierre_plan_core::models::{FailureKind, GenerationTask, PlanKind, TaskId};
use uuid::Uuid;

use crate::config::{TaskStoreBackend, TaskStoreConfig};

pub use self::memory::InMemoryTaskStore;
pub use self::redis::RedisTaskStore;

/// Result of a transition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The record changed
    Applied,
    /// The record was already terminal and was left untouched
    AlreadyTerminal,
    /// No record with that id (never created or expired)
    Missing,
}

impl TransitionOutcome {
    /// Whether the record changed
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Storage for generation task records
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Allocate an opaque id and write a `generating/0%` record with the store TTL
    async fn create(&self, owner_id: Uuid, kind: PlanKind) -> AppResult<TaskId>;

    /// Read a record scoped to its owner
    ///
    /// Another user's id, an unknown id and an expired id are all `NotFound`.
    async fn get(&self, task_id: &TaskId, owner_id: Uuid) -> AppResult<GenerationTask>;

    /// `generating -> completed`; a no-op on terminal records
    async fn complete(&self, task_id: &TaskId, result_ref: &str) -> AppResult<TransitionOutcome>;

    /// `generating -> failed`; a no-op on terminal records
    async fn fail(&self, task_id: &TaskId, failure: FailureKind) -> AppResult<TransitionOutcome>;

    /// Restart the record's TTL when a worker picks the task up
    ///
    /// Time spent waiting in the queue does not count against the run.
    async fn mark_started(&self, task_id: &TaskId) -> AppResult<TransitionOutcome>;

    /// Raise progress; ignored when not an increase or when terminal
    async fn set_progress(&self, task_id: &TaskId, percent: u8) -> AppResult<TransitionOutcome>;
}

/// Error returned for any task the caller cannot see
#[must_use]
pub fn task_not_found(task_id: &TaskId) -> AppError {
    AppError::not_found("Generation task").with_resource_id(task_id.as_str())
}

/// Build the configured task store
///
/// # Errors
///
/// Returns an error if the Redis backend is selected and the connection fails.
pub async fn create_task_store(
    config: &TaskStoreConfig,
    ttl: Duration,
) -> AppResult<Arc<dyn TaskStore>> {
    match &config.backend {
        TaskStoreBackend::Memory => Ok(Arc::new(InMemoryTaskStore::new(
            ttl,
            Some(config.cleanup_interval()),
        ))),
        TaskStoreBackend::Redis { url } => Ok(Arc::new(
            RedisTaskStore::connect(url, config.key_prefix.clone(), ttl).await?,
        )),
    }
}
