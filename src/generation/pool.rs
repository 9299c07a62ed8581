// ABOUTME: Bounded worker pool for background plan generation with queue admission control
// ABOUTME: A supervisor per unit of work turns a panic into a failed task instead of a lost one
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pierre_plan_core::constants::generation::QUEUE_FULL_RETRY_AFTER_SECS;
use pierre_plan_core::errors::{AppError, AppResult};
use pierre_plan_core::models::{FailureKind, TaskId};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::GenerationConfig;
use crate::tasks::TaskStore;

/// Admission ticket held from `Start` until the unit of work finishes
///
/// Dropping the slot frees its place in the queue, so a start that fails
/// after reserving never leaks capacity.
#[derive(Debug)]
pub struct PoolSlot {
    admitted: Arc<AtomicUsize>,
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.admitted.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs generations with at most `max_concurrent` in flight
pub struct GenerationPool {
    workers: Arc<Semaphore>,
    admitted: Arc<AtomicUsize>,
    capacity: usize,
}

impl GenerationPool {
    /// Pool running `max_concurrent` units with `max_queued` more waiting
    #[must_use]
    pub fn new(max_concurrent: usize, max_queued: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            workers: Arc::new(Semaphore::new(max_concurrent)),
            admitted: Arc::new(AtomicUsize::new(0)),
            capacity: max_concurrent.saturating_add(max_queued),
        }
    }

    /// Pool sized from the generation settings
    #[must_use]
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.max_concurrent_requests, config.max_queued_requests)
    }

    /// Running plus waiting units
    #[must_use]
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    /// Running and queued units allowed at once
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserve a place before any task record exists
    ///
    /// # Errors
    ///
    /// Returns `GenerationQueueFull` with a retry hint when the pool is at capacity.
    pub fn reserve(&self) -> AppResult<PoolSlot> {
        let capacity = self.capacity;
        self.admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| {
                warn!(capacity, "Generation queue full, rejecting start");
                AppError::queue_full(capacity, QUEUE_FULL_RETRY_AFTER_SECS)
            })?;

        Ok(PoolSlot {
            admitted: Arc::clone(&self.admitted),
        })
    }

    /// Run `work` for `task_id` once a worker permit is free
    ///
    /// The returned handle belongs to the supervisor, which resolves after
    /// the work finished and any failure was recorded on the task.
    pub fn spawn<F>(
        &self,
        slot: PoolSlot,
        task_id: TaskId,
        store: Arc<dyn TaskStore>,
        work: F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let workers = Arc::clone(&self.workers);
        let unit = tokio::spawn(async move {
            let permit = workers.acquire_owned().await;
            match permit {
                Ok(_permit) => {
                    work.await;
                    true
                }
                Err(_) => false,
            }
        });

        tokio::spawn(async move {
            let _slot = slot;
            let failure = match unit.await {
                Ok(true) => return,
                Ok(false) => {
                    error!(task_id = %task_id, "Worker pool closed before the task could run");
                    FailureKind::Internal
                }
                Err(join_error) if join_error.is_panic() => {
                    error!(task_id = %task_id, "Generation worker panicked");
                    FailureKind::Internal
                }
                Err(_) => {
                    warn!(task_id = %task_id, "Generation worker was cancelled");
                    FailureKind::Internal
                }
            };

            match store.fail(&task_id, failure).await {
                Ok(outcome) => {
                    debug!(task_id = %task_id, ?outcome, "Recorded worker fault on task");
                }
                Err(e) => {
                    error!(task_id = %task_id, error = %e, "Failed to record worker fault on task");
                }
            }
        })
    }
}
