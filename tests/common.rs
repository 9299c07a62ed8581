// ABOUTME: Shared test doubles and fixtures for generation pipeline integration tests
// ABOUTME: Scripted provider, counting client factory, flaky plan repository, plan JSON fixtures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    missing_docs,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `pierre_plan_generator`

use std::collections::VecDeque;
use std::future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use pierre_ai_providers::{ChatRequest, ChatResponse, LlmCapabilities, PlanProvider, ProviderError};
use pierre_plan_core::errors::{AppError, AppResult};
use pierre_plan_core::models::{
    AiProvider, AiProviderConfig, FitnessLevel, GenerationParams, NutritionPlanRequest,
    PlanDocument, PlanKind, TaskId, TaskStatusView, TrainingPlanRequest,
};
use pierre_plan_generator::config::{GenerationConfig, PersistenceRetryConfig, RetryConfig};
use pierre_plan_generator::crypto::SecretCipher;
use pierre_plan_generator::generation::{
    GenerationOrchestrator, InMemoryPlanRepository, PlanRepository, ProviderClientFactory,
};
use pierre_plan_generator::provider_configs::{
    InMemoryProviderConfigStore, NewProviderConfig, ProviderConfigStore,
};
use pierre_plan_generator::tasks::{InMemoryTaskStore, TaskStore};
use tokio::time;
use uuid::Uuid;
use zeroize::Zeroizing;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_test_writer()
            .try_init();
    });
}

pub const TRAINING_PLAN_JSON: &str = r#"{
  "title": "Base Strength",
  "duration_weeks": 1,
  "weeks": [
    {
      "week_number": 1,
      "focus": "foundation",
      "days": [
        {
          "day_number": 1,
          "name": "Full body",
          "duration_minutes": 45,
          "exercises": [
            { "name": "Goblet squat", "sets": 3, "reps": 10, "rest_seconds": 90 },
            { "name": "Plank", "sets": 3, "duration_minutes": 1 }
          ]
        },
        { "day_number": 2, "name": "Rest", "rest_day": true }
      ]
    }
  ]
}"#;

pub const NUTRITION_PLAN_JSON: &str = r#"{
  "title": "Lean Week",
  "daily_calories": 2200,
  "macro_ratio": { "protein": 0.3, "carbs": 0.45, "fat": 0.25 },
  "days": [
    {
      "day_number": 1,
      "meals": [
        {
          "meal_type": "breakfast",
          "name": "Oats",
          "items": [
            { "name": "Rolled oats", "quantity": 80, "unit": "g", "calories": 300, "protein_g": 10, "carbs_g": 54, "fat_g": 5 }
          ]
        }
      ]
    },
    {
      "day_number": 2,
      "meals": [
        {
          "meal_type": "lunch",
          "name": "Chicken bowl",
          "items": [
            { "name": "Chicken breast", "quantity": 150, "unit": "g", "calories": 250, "protein_g": 46, "carbs_g": 0, "fat_g": 5 }
          ]
        }
      ]
    }
  ]
}"#;

/// One-week training request matching [`TRAINING_PLAN_JSON`]
pub fn training_params() -> GenerationParams {
    GenerationParams::Training(TrainingPlanRequest {
        goal: "Build general strength".to_owned(),
        fitness_level: FitnessLevel::Beginner,
        duration_weeks: 1,
        days_per_week: 1,
        session_minutes: 45,
        equipment: vec!["dumbbells".to_owned()],
        focus_areas: Vec::new(),
        limitations: Vec::new(),
        start_date: None,
        end_date: None,
    })
}

/// Two-day nutrition request matching [`NUTRITION_PLAN_JSON`]
pub fn nutrition_params() -> GenerationParams {
    GenerationParams::Nutrition(NutritionPlanRequest {
        goal: "Fat loss".to_owned(),
        daily_calories: Some(2200.0),
        macro_ratio: None,
        meals_per_day: 1,
        duration_days: 2,
        dietary_restrictions: Vec::new(),
        allergies: vec!["peanuts".to_owned()],
        start_date: None,
        end_date: None,
    })
}

/// What the scripted provider does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Output(String),
    Fail(ProviderError),
    Hang,
    Panic,
}

impl Step {
    pub fn output(text: &str) -> Self {
        Self::Output(text.to_owned())
    }

    pub fn server_error() -> Self {
        Self::Fail(ProviderError::ServerError {
            provider: "openai".to_owned(),
            status_code: 503,
        })
    }

    pub fn auth_error() -> Self {
        Self::Fail(ProviderError::AuthenticationFailed {
            provider: "openai".to_owned(),
        })
    }
}

/// Provider that plays back a fixed script, repeating the last step
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(vec![step])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// User messages received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let next = self.steps.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last.clone().expect("scripted provider has no steps"),
        }
    }
}

#[async_trait]
impl PlanProvider for ScriptedProvider {
    fn provider(&self) -> AiProvider {
        AiProvider::OpenAi
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::hosted()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = request.messages.last() {
            self.prompts.lock().unwrap().push(message.content.clone());
        }

        match self.next_step() {
            Step::Output(content) => Ok(ChatResponse {
                content,
                model: "scripted-model".to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            Step::Fail(error) => Err(error),
            Step::Hang => future::pending().await,
            Step::Panic => panic!("scripted provider fault"),
        }
    }
}

/// Hands out the same scripted provider and counts constructions
pub struct CountingFactory {
    provider: Arc<ScriptedProvider>,
    builds: AtomicU32,
    secrets_seen: Mutex<Vec<bool>>,
}

impl CountingFactory {
    pub fn new(provider: Arc<ScriptedProvider>) -> Self {
        Self {
            provider,
            builds: AtomicU32::new(0),
            secrets_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn builds(&self) -> u32 {
        self.builds.load(Ordering::SeqCst)
    }

    /// Whether each build received a non-empty secret
    pub fn secrets_seen(&self) -> Vec<bool> {
        self.secrets_seen.lock().unwrap().clone()
    }
}

impl ProviderClientFactory for CountingFactory {
    fn build(
        &self,
        _config: &AiProviderConfig,
        secret: Option<Zeroizing<String>>,
    ) -> AppResult<Arc<dyn PlanProvider>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.secrets_seen
            .lock()
            .unwrap()
            .push(secret.is_some_and(|s| !s.is_empty()));
        Ok(Arc::clone(&self.provider) as Arc<dyn PlanProvider>)
    }
}

/// Repository failing a fixed number of saves before delegating
pub struct FlakyRepository {
    failures_left: AtomicU32,
    saves: AtomicU32,
    inner: InMemoryPlanRepository,
}

impl FlakyRepository {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            saves: AtomicU32::new(0),
            inner: InMemoryPlanRepository::new(),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    pub fn saves(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanRepository for FlakyRepository {
    async fn save(
        &self,
        owner_id: Uuid,
        kind: PlanKind,
        plan: &PlanDocument,
    ) -> AppResult<String> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::storage("plan store unavailable"));
        }
        self.inner.save(owner_id, kind, plan).await
    }
}

/// Settings with short deadlines and no jitter
pub fn fast_config() -> GenerationConfig {
    GenerationConfig {
        attempt_timeout: Duration::from_secs(2),
        retry: RetryConfig::fixed(3, 10),
        persistence: PersistenceRetryConfig {
            max_attempts: 3,
            delay_ms: 5,
        },
        ..GenerationConfig::default()
    }
}

/// Everything an orchestrator test needs to inspect
pub struct Harness {
    pub orchestrator: GenerationOrchestrator,
    pub provider: Arc<ScriptedProvider>,
    pub factory: Arc<CountingFactory>,
    pub configs: Arc<InMemoryProviderConfigStore>,
    pub tasks: Arc<InMemoryTaskStore>,
    pub owner_id: Uuid,
    pub config_id: Uuid,
}

/// Orchestrator over in-memory stores with one default `OpenAI` config
pub async fn harness_with(
    provider: ScriptedProvider,
    config: GenerationConfig,
    plans: Arc<dyn PlanRepository>,
) -> AppResult<Harness> {
    init_test_logging();
    let cipher = Arc::new(SecretCipher::generate());
    let configs = Arc::new(InMemoryProviderConfigStore::new(Arc::clone(&cipher)));
    let tasks = Arc::new(InMemoryTaskStore::new(config.task_ttl, None));
    let provider = Arc::new(provider);
    let factory = Arc::new(CountingFactory::new(Arc::clone(&provider)));

    let owner_id = Uuid::new_v4();
    let stored = configs
        .add(
            owner_id,
            NewProviderConfig::new(AiProvider::OpenAi, "work").with_secret("sk-test-0123456789"),
        )
        .await?;

    let orchestrator = GenerationOrchestrator::new(
        config,
        Arc::clone(&tasks) as Arc<dyn TaskStore>,
        Arc::clone(&configs) as Arc<dyn ProviderConfigStore>,
        plans,
        cipher,
    )
    .with_client_factory(Arc::clone(&factory) as Arc<dyn ProviderClientFactory>);

    Ok(Harness {
        orchestrator,
        provider,
        factory,
        configs,
        tasks,
        owner_id,
        config_id: stored.id,
    })
}

pub async fn harness(provider: ScriptedProvider) -> AppResult<Harness> {
    harness_with(provider, fast_config(), Arc::new(InMemoryPlanRepository::new())).await
}

/// Poll until the task leaves `generating`
pub async fn wait_for_terminal(
    orchestrator: &GenerationOrchestrator,
    task_id: &TaskId,
    owner_id: Uuid,
) -> AppResult<TaskStatusView> {
    for _ in 0..2_000 {
        let view = orchestrator.get_status(task_id, owner_id).await?;
        if view.status.is_terminal() {
            return Ok(view);
        }
        time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}
