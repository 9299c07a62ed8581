// ABOUTME: PlanRepository contract for durable plan storage and an in-memory implementation
// ABOUTME: Saves after a successful generation are retried on their own fixed-delay budget
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pierre_plan_core::errors::{AppError, AppResult};
use pierre_plan_core::models::{PlanDocument, PlanKind};
use serde::{Deserialize, Serialize};
use tokio::time;
use tracing::warn;
use uuid::Uuid;

use crate::config::PersistenceRetryConfig;

/// Durable storage for finished plans
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Store a validated plan and return its reference
    async fn save(&self, owner_id: Uuid, kind: PlanKind, plan: &PlanDocument)
        -> AppResult<String>;
}

/// Save with the persistence retry policy
///
/// # Errors
///
/// Returns the last save error once every attempt failed.
pub async fn save_with_retry(
    repository: &dyn PlanRepository,
    policy: &PersistenceRetryConfig,
    owner_id: Uuid,
    kind: PlanKind,
    plan: &PlanDocument,
) -> AppResult<String> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match repository.save(owner_id, kind, plan).await {
            Ok(plan_ref) => return Ok(plan_ref),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "Plan save failed, retrying");
                attempt += 1;
                time::sleep(policy.delay()).await;
            }
        }
    }
}

/// A plan as held by [`InMemoryPlanRepository`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPlan {
    /// Reference handed to the task
    pub id: String,
    /// Owning user
    pub owner_id: Uuid,
    /// Plan kind
    pub kind: PlanKind,
    /// Validated document
    pub plan: PlanDocument,
    /// Save time
    pub created_at: DateTime<Utc>,
}

/// Process-local plan storage
#[derive(Default)]
pub struct InMemoryPlanRepository {
    plans: DashMap<String, StoredPlan>,
}

impl InMemoryPlanRepository {
    /// Empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a plan scoped to its owner
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown references and for other users' plans.
    pub fn get(&self, owner_id: Uuid, plan_ref: &str) -> AppResult<StoredPlan> {
        self.plans
            .get(plan_ref)
            .filter(|stored| stored.owner_id == owner_id)
            .map(|stored| stored.clone())
            .ok_or_else(|| AppError::not_found("Plan").with_resource_id(plan_ref))
    }

    /// Plans saved so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Whether nothing was saved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn save(
        &self,
        owner_id: Uuid,
        kind: PlanKind,
        plan: &PlanDocument,
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        self.plans.insert(
            id.clone(),
            StoredPlan {
                id: id.clone(),
                owner_id,
                kind,
                plan: plan.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }
}
