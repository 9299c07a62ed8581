// ABOUTME: Generation task record with write-once terminal state transitions
// ABOUTME: TaskId, PlanKind, TaskStatus, FailureKind and the poll-facing TaskStatusView
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::constants::{progress, tasks::TASK_ID_BYTES};

/// Opaque task handle: 128 random bits, URL-safe base64 without padding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Allocate a fresh unguessable id
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0_u8; TASK_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap an id received from a caller
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the encoded id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which plan a task produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Multi-week training schedule
    Training,
    /// Multi-day meal schedule
    Nutrition,
}

impl PlanKind {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Nutrition => "nutrition",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a generation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Work admitted or in flight
    Generating,
    /// Plan persisted; `result_ref` is set
    Completed,
    /// Terminal failure; `error_message` is set
    Failed,
}

impl TaskStatus {
    /// Whether no further mutation is permitted
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Classified reason a task failed
///
/// The only text ever written to a task's `error_message` is
/// [`FailureKind::user_message`], so vendor diagnostics and credential
/// fragments cannot reach a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient provider failures exhausted the attempt budget
    ServiceUnavailable,
    /// Provider refused the credentials or the request
    ProviderRejected,
    /// Output could not be isolated or validated as a plan
    OutputInvalid,
    /// Plan was generated but the save failed
    PersistenceFailed,
    /// Unexpected fault in the worker
    Internal,
}

impl FailureKind {
    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable => "service_unavailable",
            Self::ProviderRejected => "provider_rejected",
            Self::OutputInvalid => "output_invalid",
            Self::PersistenceFailed => "persistence_failed",
            Self::Internal => "internal",
        }
    }

    /// Sanitized, actionable message for the task record
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable => {
                "The plan generation service is unavailable right now. Please try again later."
            }
            Self::ProviderRejected => {
                "The AI provider rejected the request. Please review your AI provider configuration."
            }
            Self::OutputInvalid => {
                "The AI provider returned a plan that did not pass validation. Please try generating again."
            }
            Self::PersistenceFailed => {
                "The plan was generated but could not be saved. Please try again."
            }
            Self::Internal => "Plan generation failed unexpectedly. Please try again.",
        }
    }
}

/// One tracked asynchronous generation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTask {
    /// Opaque external handle
    pub id: TaskId,
    /// Requesting user; every read is scoped to it
    pub owner_id: Uuid,
    /// Plan being generated
    pub kind: PlanKind,
    /// Lifecycle status
    pub status: TaskStatus,
    /// 0-100, non-decreasing while generating
    pub progress: u8,
    /// Persisted plan reference, only on `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    /// Sanitized message, only on `failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Classification, only on `failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time after which the store forgets the record
    pub expires_at: DateTime<Utc>,
}

impl GenerationTask {
    /// Initial `generating/0%` record
    #[must_use]
    pub fn new(owner_id: Uuid, kind: PlanKind, ttl: StdDuration) -> Self {
        let created_at = Utc::now();
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(1));
        Self {
            id: TaskId::generate(),
            owner_id,
            kind,
            status: TaskStatus::Generating,
            progress: 0,
            result_ref: None,
            error_message: None,
            failure_kind: None,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Whether the record outlived its TTL
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Push expiry out to `now + ttl` while generating; never shortens it
    pub fn renew_expiry(&mut self, ttl: StdDuration, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(1));
        self.expires_at = self.expires_at.max(now + ttl);
        true
    }

    /// Raise progress; returns false when terminal or not an increase
    pub fn advance_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(progress::COMPLETE);
        if self.status.is_terminal() || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    /// Move to `completed`; no-op returning false when already terminal
    pub fn complete(&mut self, result_ref: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.progress = progress::COMPLETE;
        self.result_ref = Some(result_ref.into());
        true
    }

    /// Move to `failed`; no-op returning false when already terminal
    pub fn fail(&mut self, kind: FailureKind) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error_message = Some(kind.user_message().to_owned());
        self.failure_kind = Some(kind);
        true
    }

    /// Poll-facing projection of the record
    #[must_use]
    pub fn status_view(&self) -> TaskStatusView {
        TaskStatusView {
            task_id: self.id.clone(),
            kind: self.kind,
            status: self.status,
            progress: self.progress,
            result_ref: self.result_ref.clone(),
            error_message: self.error_message.clone(),
            failure_kind: self.failure_kind,
        }
    }
}

/// Response to a status poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusView {
    /// Task handle
    pub task_id: TaskId,
    /// Plan being generated
    pub kind: PlanKind,
    /// Lifecycle status
    pub status: TaskStatus,
    /// 0-100
    pub progress: u8,
    /// Persisted plan reference on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    /// Sanitized failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Failure classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

/// Response to a start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedTask {
    /// Task handle to poll
    pub task_id: TaskId,
    /// Always `generating`
    pub status: TaskStatus,
    /// Rough wall time until a terminal state
    pub estimated_time_seconds: u64,
}
