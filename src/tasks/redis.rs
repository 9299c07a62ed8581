// ABOUTME: Redis-backed TaskStore for multi-instance deployments
// ABOUTME: JSON records with SET EX; every transition is a Lua compare-and-set on status
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use pierre_plan_core::errors::{AppError, AppResult};
use pierre_plan_core::models::{FailureKind, GenerationTask, PlanKind, TaskId};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, Script};
use tracing::{error, info};
use uuid::Uuid;

use super::{task_not_found, TaskStore, TransitionOutcome};

/// Compare-and-set on `status == "generating"`, preserving the key's TTL
/// except for `start`, which rewrites `expires_at` and resets the key TTL.
///
/// Returns 0 when the key is missing, 1 when the record is already
/// terminal, 2 when the change was written.
const TRANSITION_SCRIPT: &str = r"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return 0
end
local task = cjson.decode(raw)
if task.status ~= 'generating' then
  return 1
end
local mode = ARGV[1]
if mode == 'complete' then
  task.status = 'completed'
  task.progress = 100
  task.result_ref = ARGV[2]
elseif mode == 'fail' then
  task.status = 'failed'
  task.error_message = ARGV[2]
  task.failure_kind = ARGV[3]
elseif mode == 'start' then
  task.expires_at = ARGV[2]
  redis.call('SET', KEYS[1], cjson.encode(task), 'EX', tonumber(ARGV[3]))
  return 2
else
  local percent = math.min(tonumber(ARGV[2]), 100)
  if percent <= task.progress then
    return 2
  end
  task.progress = percent
end
redis.call('SET', KEYS[1], cjson.encode(task), 'KEEPTTL')
return 2
";

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Task store shared across processes through Redis
#[derive(Clone)]
pub struct RedisTaskStore {
    manager: ConnectionManager,
    key_prefix: String,
    ttl: Duration,
    transition: Script,
}

impl RedisTaskStore {
    /// Connect to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection fails.
    pub async fn connect(url: &str, key_prefix: String, ttl: Duration) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::config(format!("Invalid Redis URL for task store: {e}")))?;
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(CONNECTION_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT);
        let manager = ConnectionManager::new_with_config(client, config)
            .await
            .map_err(|e| AppError::storage(format!("Failed to connect to Redis: {e}")))?;

        info!(key_prefix = %key_prefix, ttl_secs = ttl.as_secs(), "Redis task store connected");
        Ok(Self {
            manager,
            key_prefix,
            ttl,
            transition: Script::new(TRANSITION_SCRIPT),
        })
    }

    fn build_key(&self, task_id: &TaskId) -> String {
        format!("{}{}", self.key_prefix, task_id)
    }

    fn storage_error(operation: &str, e: &redis::RedisError) -> AppError {
        error!(operation, error = %e, "Redis task store operation failed");
        AppError::storage(format!("Task store {operation} failed"))
    }

    async fn run_transition(&self, task_id: &TaskId, args: &[&str]) -> AppResult<TransitionOutcome> {
        let mut conn = self.manager.clone();
        let mut invocation = self.transition.key(self.build_key(task_id));
        for arg in args {
            invocation.arg(*arg);
        }
        let code: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("transition", &e))?;

        Ok(match code {
            0 => TransitionOutcome::Missing,
            1 => TransitionOutcome::AlreadyTerminal,
            _ => TransitionOutcome::Applied,
        })
    }
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn create(&self, owner_id: Uuid, kind: PlanKind) -> AppResult<TaskId> {
        let task = GenerationTask::new(owner_id, kind, self.ttl);
        let payload = serde_json::to_string(&task)?;
        let mut conn = self.manager.clone();

        let written: Option<String> = redis::cmd("SET")
            .arg(self.build_key(&task.id))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("create", &e))?;

        if written.is_none() {
            return Err(AppError::storage("Task id collision; retry the request"));
        }
        Ok(task.id)
    }

    async fn get(&self, task_id: &TaskId, owner_id: Uuid) -> AppResult<GenerationTask> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn
            .get(self.build_key(task_id))
            .await
            .map_err(|e| Self::storage_error("get", &e))?;

        let task: GenerationTask = match raw {
            Some(raw) => serde_json::from_str(&raw)?,
            None => return Err(task_not_found(task_id)),
        };
        if task.owner_id != owner_id || task.is_expired(Utc::now()) {
            return Err(task_not_found(task_id));
        }
        Ok(task)
    }

    async fn complete(&self, task_id: &TaskId, result_ref: &str) -> AppResult<TransitionOutcome> {
        self.run_transition(task_id, &["complete", result_ref]).await
    }

    async fn fail(&self, task_id: &TaskId, failure: FailureKind) -> AppResult<TransitionOutcome> {
        self.run_transition(
            task_id,
            &["fail", failure.user_message(), failure.as_str()],
        )
        .await
    }

    async fn mark_started(&self, task_id: &TaskId) -> AppResult<TransitionOutcome> {
        let ttl = ChronoDuration::from_std(self.ttl).unwrap_or_else(|_| ChronoDuration::days(1));
        let expires_at = (Utc::now() + ttl).to_rfc3339_opts(SecondsFormat::Millis, true);
        let ttl_secs = self.ttl.as_secs().max(1).to_string();
        self.run_transition(task_id, &["start", &expires_at, &ttl_secs])
            .await
    }

    async fn set_progress(&self, task_id: &TaskId, percent: u8) -> AppResult<TransitionOutcome> {
        let percent = percent.to_string();
        self.run_transition(task_id, &["progress", &percent]).await
    }
}
