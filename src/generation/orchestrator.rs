// ABOUTME: GenerationOrchestrator: synchronous start checks, background pipeline, status polls
// ABOUTME: Build prompt, execute, parse, persist and finalize run strictly in order per task
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Generation Orchestrator
//!
//! `start` does only cheap work before returning a handle: request
//! validation, provider config resolution, client construction and queue
//! admission. Everything that can take seconds runs in the worker pool and
//! is visible to the caller only through `get_status`.

use std::sync::Arc;
use std::time::Instant;

use pierre_ai_providers::{
    configure_shared_client, HttpClientSettings, PlanProvider, ProviderClient, ProviderError,
};
use pierre_plan_core::constants::progress;
use pierre_plan_core::errors::AppResult;
use pierre_plan_core::models::{
    AiProviderConfig, ConnectionStatus, ConnectionTestResult, FailureKind, GenerationParams,
    GenerationRequest, StartedTask, TaskId, TaskStatus, TaskStatusView,
};
use tokio::time;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::executor::{failure_kind, AttemptBudget, RequestExecutor};
use super::parser::ResponseParser;
use super::pool::GenerationPool;
use super::prompts::PromptBuilder;
use super::repository::{save_with_retry, PlanRepository};
use crate::config::GenerationConfig;
use crate::crypto::SecretCipher;
use crate::logging::GenerationLogger;
use crate::provider_configs::{decrypt_secret, ProviderConfigStore};
use crate::tasks::{TaskStore, TransitionOutcome};

/// Builds the client for one generation or connection test
///
/// The decrypted secret is handed over by value and must not outlive the
/// returned client.
pub trait ProviderClientFactory: Send + Sync {
    /// Client for `config`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the client cannot be built.
    fn build(
        &self,
        config: &AiProviderConfig,
        secret: Option<Zeroizing<String>>,
    ) -> AppResult<Arc<dyn PlanProvider>>;
}

/// Factory producing real vendor clients
#[derive(Debug, Default, Clone, Copy)]
pub struct VendorClientFactory;

impl ProviderClientFactory for VendorClientFactory {
    fn build(
        &self,
        config: &AiProviderConfig,
        secret: Option<Zeroizing<String>>,
    ) -> AppResult<Arc<dyn PlanProvider>> {
        Ok(Arc::new(ProviderClient::from_config(config, secret)?))
    }
}

/// State shared by every background unit
struct Pipeline {
    config: GenerationConfig,
    executor: RequestExecutor,
    tasks: Arc<dyn TaskStore>,
    plans: Arc<dyn PlanRepository>,
}

/// Coordinates plan generation from start to terminal task state
pub struct GenerationOrchestrator {
    pipeline: Arc<Pipeline>,
    provider_configs: Arc<dyn ProviderConfigStore>,
    cipher: Arc<SecretCipher>,
    clients: Arc<dyn ProviderClientFactory>,
    pool: GenerationPool,
}

impl GenerationOrchestrator {
    /// Orchestrator using real vendor clients
    #[must_use]
    pub fn new(
        config: GenerationConfig,
        tasks: Arc<dyn TaskStore>,
        provider_configs: Arc<dyn ProviderConfigStore>,
        plans: Arc<dyn PlanRepository>,
        cipher: Arc<SecretCipher>,
    ) -> Self {
        if !configure_shared_client(HttpClientSettings::for_attempt_timeout(
            config.attempt_timeout,
        )) {
            debug!("Vendor HTTP client already configured");
        }
        let executor = RequestExecutor::from_config(&config);
        let pool = GenerationPool::from_config(&config);
        Self {
            pipeline: Arc::new(Pipeline {
                config,
                executor,
                tasks,
                plans,
            }),
            provider_configs,
            cipher,
            clients: Arc::new(VendorClientFactory),
            pool,
        }
    }

    /// Replace the client factory
    #[must_use]
    pub fn with_client_factory(mut self, clients: Arc<dyn ProviderClientFactory>) -> Self {
        self.clients = clients;
        self
    }

    /// Generation settings in effect
    #[must_use]
    pub fn config(&self) -> &GenerationConfig {
        &self.pipeline.config
    }

    /// Worker pool backing this orchestrator
    #[must_use]
    pub const fn pool(&self) -> &GenerationPool {
        &self.pool
    }

    /// Admit a generation and return its handle
    ///
    /// # Errors
    ///
    /// Returns the validation error for an invalid request,
    /// `ProviderConfigMissing` when no usable provider config exists,
    /// `GenerationQueueFull` when the pool is saturated, or a storage error
    /// if the task record cannot be written. No task exists after an error.
    #[instrument(skip(self, request), fields(user.id = %owner_id, plan.kind = %request.params.kind()))]
    pub async fn start(
        &self,
        owner_id: Uuid,
        request: GenerationRequest,
    ) -> AppResult<StartedTask> {
        request.params.validate()?;

        let provider_config = self
            .provider_configs
            .resolve(owner_id, request.provider_config_id)
            .await?;
        let client = self.build_client(&provider_config)?;

        let slot = self.pool.reserve()?;
        let kind = request.params.kind();
        let task_id = self.pipeline.tasks.create(owner_id, kind).await?;
        self.pipeline
            .tasks
            .set_progress(&task_id, progress::QUEUED)
            .await?;

        GenerationLogger::log_task_started(
            &task_id,
            owner_id,
            kind,
            provider_config.provider.as_str(),
        );

        let job = GenerationJob {
            task_id: task_id.clone(),
            owner_id,
            params: request.params,
            client,
            pipeline: Arc::clone(&self.pipeline),
        };
        self.pool.spawn(
            slot,
            task_id.clone(),
            Arc::clone(&self.pipeline.tasks),
            job.run(),
        );

        Ok(StartedTask {
            task_id,
            status: TaskStatus::Generating,
            estimated_time_seconds: self.pipeline.config.estimated_secs(kind),
        })
    }

    /// Current status of a task owned by `owner_id`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown, expired or foreign task ids.
    pub async fn get_status(&self, task_id: &TaskId, owner_id: Uuid) -> AppResult<TaskStatusView> {
        Ok(self.pipeline.tasks.get(task_id, owner_id).await?.status_view())
    }

    /// Issue a tiny request with a stored provider config
    ///
    /// Provider-side failures are reported in the result, not as errors.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the config does not exist for `owner_id`.
    #[instrument(skip(self), fields(user.id = %owner_id))]
    pub async fn test_connection(
        &self,
        owner_id: Uuid,
        config_id: Uuid,
    ) -> AppResult<ConnectionTestResult> {
        let config = self.provider_configs.get(owner_id, config_id).await?;
        let started = Instant::now();

        let client = match self.build_client(&config) {
            Ok(client) => client,
            Err(e) => {
                warn!(provider = %config.provider, error = %e, "Connection test could not build client");
                return Ok(ConnectionTestResult {
                    status: ConnectionStatus::Failure,
                    response_time_ms: 0,
                    model_info: None,
                    message: "The configuration is incomplete. Check the stored credential and settings."
                        .to_owned(),
                });
            }
        };

        let timeout = self.pipeline.config.connection_test_timeout;
        let outcome = time::timeout(timeout, client.test_connection()).await;
        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Ok(Ok(model)) => ConnectionTestResult {
                status: ConnectionStatus::Success,
                response_time_ms,
                model_info: Some(model),
                message: format!("Connected to {}", config.provider),
            },
            Ok(Err(e)) => {
                warn!(provider = %config.provider, error = %e, "Connection test failed");
                ConnectionTestResult {
                    status: ConnectionStatus::Failure,
                    response_time_ms,
                    model_info: None,
                    message: connection_failure_message(failure_kind(&e)).to_owned(),
                }
            }
            Err(_) => ConnectionTestResult {
                status: ConnectionStatus::Failure,
                response_time_ms,
                model_info: None,
                message: format!(
                    "The provider did not answer within {} seconds.",
                    timeout.as_secs()
                ),
            },
        };

        info!(
            provider = %config.provider,
            status = ?result.status,
            response_time_ms,
            "Connection test finished"
        );
        Ok(result)
    }

    /// Decrypt the credential and build the client; the secret dies with the client
    fn build_client(&self, config: &AiProviderConfig) -> AppResult<Arc<dyn PlanProvider>> {
        let secret = decrypt_secret(&self.cipher, config)?;
        self.clients.build(config, secret)
    }
}

const fn connection_failure_message(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::ProviderRejected => {
            "The provider rejected the request. Check the credential, model and endpoint."
        }
        FailureKind::OutputInvalid => "The provider answered with an unexpected response.",
        _ => "The provider could not be reached. Please try again later.",
    }
}

/// One admitted generation, run inside the worker pool
struct GenerationJob {
    task_id: TaskId,
    owner_id: Uuid,
    params: GenerationParams,
    client: Arc<dyn PlanProvider>,
    pipeline: Arc<Pipeline>,
}

impl GenerationJob {
    async fn run(self) {
        match self.pipeline.tasks.mark_started(&self.task_id).await {
            Ok(TransitionOutcome::Missing) => {
                warn!(task_id = %self.task_id, "Task expired while queued, skipping generation");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "Could not renew task TTL at pickup");
            }
        }

        let started = Instant::now();
        let kind = self.params.kind();
        let mut budget = self.pipeline.executor.budget();

        let outcome = self.generate(&mut budget).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let tasks = &self.pipeline.tasks;

        match outcome {
            Ok(plan_ref) => match tasks.complete(&self.task_id, &plan_ref).await {
                Ok(transition) if transition.is_applied() => {
                    GenerationLogger::log_task_completed(
                        &self.task_id,
                        kind,
                        budget.used(),
                        duration_ms,
                    );
                }
                Ok(transition) => {
                    warn!(task_id = %self.task_id, ?transition, "Completed plan not recorded on task");
                }
                Err(e) => {
                    error!(task_id = %self.task_id, error = %e, "Failed to record task completion");
                }
            },
            Err(failure) => {
                if let Err(e) = tasks.fail(&self.task_id, failure).await {
                    error!(task_id = %self.task_id, error = %e, "Failed to record task failure");
                }
                GenerationLogger::log_task_failed(
                    &self.task_id,
                    kind,
                    failure,
                    budget.used(),
                    duration_ms,
                );
            }
        }
    }

    /// build -> execute -> parse -> persist; returns the plan reference
    async fn generate(&self, budget: &mut AttemptBudget) -> Result<String, FailureKind> {
        let pipeline = &self.pipeline;
        let mut prompt = PromptBuilder::build(&self.params);
        self.progress(progress::PROMPT_BUILT).await;

        let mut regenerated = false;
        let plan = loop {
            self.progress(progress::PROVIDER_CALLED).await;
            let rejection = match pipeline
                .executor
                .execute(self.client.as_ref(), &prompt, budget)
                .await
            {
                Ok(raw) => {
                    self.progress(progress::RESPONSE_RECEIVED).await;
                    match ResponseParser::parse_for_request(&raw, &self.params) {
                        Ok(plan) => break plan,
                        Err(e) => format!("{e} (output_len={})", raw.len()),
                    }
                }
                // Empty or malformed completions get the same single regenerate
                Err(e @ ProviderError::InvalidResponse { .. }) => e.to_string(),
                Err(e) => return Err(failure_kind(&e)),
            };

            let regenerate = pipeline.config.regenerate_on_parse_failure
                && !regenerated
                && budget.has_remaining();
            warn!(
                task_id = %self.task_id,
                error = %rejection,
                regenerate,
                "Provider output rejected"
            );
            if !regenerate {
                return Err(FailureKind::OutputInvalid);
            }
            regenerated = true;
            prompt = PromptBuilder::regenerate(&prompt);
        };
        self.progress(progress::VALIDATED).await;

        let plan_ref = save_with_retry(
            pipeline.plans.as_ref(),
            &pipeline.config.persistence,
            self.owner_id,
            self.params.kind(),
            &plan,
        )
        .await
        .map_err(|e| {
            error!(task_id = %self.task_id, error = %e, "Plan generated but save failed");
            FailureKind::PersistenceFailed
        })?;
        self.progress(progress::SAVED).await;

        Ok(plan_ref)
    }

    async fn progress(&self, percent: u8) {
        if let Err(e) = self.pipeline.tasks.set_progress(&self.task_id, percent).await {
            debug!(task_id = %self.task_id, percent, error = %e, "Progress update failed");
        }
    }
}
