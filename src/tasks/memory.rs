// ABOUTME: In-memory TaskStore backed by DashMap with a background TTL sweep
// ABOUTME: Transitions run under the entry lock so terminal states are write-once
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use pierre_plan_core::errors::AppResult;
use pierre_plan_core::models::{FailureKind, GenerationTask, PlanKind, TaskId};
use tokio::sync::mpsc;
use tokio::time;
use tracing::debug;
use uuid::Uuid;

use super::{task_not_found, TaskStore, TransitionOutcome};

type TaskMap = DashMap<TaskId, GenerationTask>;

/// Process-local task store
///
/// Expired records are invisible to reads immediately and are physically
/// removed by the sweep task. The sweep stops when the store is dropped.
pub struct InMemoryTaskStore {
    tasks: Arc<TaskMap>,
    ttl: Duration,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl InMemoryTaskStore {
    /// Create a store; `cleanup_interval` spawns a sweep on the current runtime
    #[must_use]
    pub fn new(ttl: Duration, cleanup_interval: Option<Duration>) -> Self {
        let tasks = Arc::new(TaskMap::new());
        let shutdown_tx = cleanup_interval.map(|interval| Self::spawn_sweep(&tasks, interval));
        Self {
            tasks,
            ttl,
            shutdown_tx,
        }
    }

    fn spawn_sweep(tasks: &Arc<TaskMap>, every: Duration) -> mpsc::Sender<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let tasks = Arc::clone(tasks);

        tokio::spawn(async move {
            let mut interval = time::interval(every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        Self::sweep(&tasks);
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Task store sweep received shutdown signal");
                        break;
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Drop expired records; returns how many were removed
    fn sweep(tasks: &TaskMap) -> usize {
        let now = Utc::now();
        let before = tasks.len();
        tasks.retain(|_, task| !task.is_expired(now));
        let removed = before.saturating_sub(tasks.len());
        if removed > 0 {
            debug!(removed, "Swept expired generation tasks");
        }
        removed
    }

    /// Remove expired records now
    pub fn purge_expired(&self) -> usize {
        Self::sweep(&self.tasks)
    }

    /// Records currently held, expired ones included until swept
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Apply `change` to a live record under its entry lock
    fn update<F>(&self, task_id: &TaskId, change: F) -> TransitionOutcome
    where
        F: FnOnce(&mut GenerationTask) -> bool,
    {
        let Some(mut task) = self.tasks.get_mut(task_id) else {
            return TransitionOutcome::Missing;
        };
        if task.is_expired(Utc::now()) {
            return TransitionOutcome::Missing;
        }
        if task.status.is_terminal() {
            return TransitionOutcome::AlreadyTerminal;
        }
        if change(task.value_mut()) {
            TransitionOutcome::Applied
        } else {
            TransitionOutcome::AlreadyTerminal
        }
    }
}

impl Drop for InMemoryTaskStore {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, owner_id: Uuid, kind: PlanKind) -> AppResult<TaskId> {
        let task = GenerationTask::new(owner_id, kind, self.ttl);
        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        Ok(id)
    }

    async fn get(&self, task_id: &TaskId, owner_id: Uuid) -> AppResult<GenerationTask> {
        self.tasks
            .get(task_id)
            .filter(|task| task.owner_id == owner_id && !task.is_expired(Utc::now()))
            .map(|task| task.clone())
            .ok_or_else(|| task_not_found(task_id))
    }

    async fn complete(&self, task_id: &TaskId, result_ref: &str) -> AppResult<TransitionOutcome> {
        Ok(self.update(task_id, |task| task.complete(result_ref)))
    }

    async fn fail(&self, task_id: &TaskId, failure: FailureKind) -> AppResult<TransitionOutcome> {
        Ok(self.update(task_id, |task| task.fail(failure)))
    }

    async fn mark_started(&self, task_id: &TaskId) -> AppResult<TransitionOutcome> {
        let ttl = self.ttl;
        Ok(self.update(task_id, |task| task.renew_expiry(ttl, Utc::now())))
    }

    async fn set_progress(&self, task_id: &TaskId, percent: u8) -> AppResult<TransitionOutcome> {
        Ok(self.update(task_id, |task| {
            task.advance_progress(percent);
            true
        }))
    }
}
