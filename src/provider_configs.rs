// ABOUTME: Per-user AI provider configuration store with a unique default per user
// ABOUTME: Encrypts credentials on write, resolves the config used by a generation request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Provider Configurations
//!
//! Every mutation for one user runs inside that user's `DashMap` entry lock,
//! so the "at most one default" rule holds after any interleaving of
//! `add`, `remove` and `set_default`. The first config a user adds becomes
//! their default; removing the default promotes the most recently updated
//! remaining config.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use pierre_plan_core::errors::{AppError, AppResult, ErrorCode};
use pierre_plan_core::models::{AiProvider, AiProviderConfig, GenerationSettings};
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{credential_aad_context, SecretCipher};

/// Input for creating a provider configuration
pub struct NewProviderConfig {
    /// Vendor
    pub provider: AiProvider,
    /// Display name
    pub name: String,
    /// Plaintext credential; encrypted before it is stored
    pub secret: Option<Zeroizing<String>>,
    /// Generation parameters
    pub settings: GenerationSettings,
    /// Make this the owner's default regardless of existing configs
    pub make_default: bool,
}

impl NewProviderConfig {
    /// Config for a vendor with default settings
    #[must_use]
    pub fn new(provider: AiProvider, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            secret: None,
            settings: GenerationSettings::default(),
            make_default: false,
        }
    }

    /// Attach a plaintext credential
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(Zeroizing::new(secret.into()));
        self
    }

    /// Override generation settings
    #[must_use]
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Request the default flag
    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.make_default = true;
        self
    }
}

/// Storage for users' provider configurations
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    /// Validate, encrypt and store a new config
    async fn add(&self, owner_id: Uuid, config: NewProviderConfig) -> AppResult<AiProviderConfig>;

    /// Fetch one of the owner's configs; another user's id is `NotFound`
    async fn get(&self, owner_id: Uuid, config_id: Uuid) -> AppResult<AiProviderConfig>;

    /// All of the owner's configs, most recently updated first
    async fn list(&self, owner_id: Uuid) -> AppResult<Vec<AiProviderConfig>>;

    /// Delete a config, promoting a new default if needed
    async fn remove(&self, owner_id: Uuid, config_id: Uuid) -> AppResult<()>;

    /// Make a config the owner's only default
    async fn set_default(&self, owner_id: Uuid, config_id: Uuid) -> AppResult<AiProviderConfig>;

    /// Enable or disable a config
    async fn set_active(
        &self,
        owner_id: Uuid,
        config_id: Uuid,
        active: bool,
    ) -> AppResult<AiProviderConfig>;

    /// Pick the config a generation should use
    ///
    /// An explicit id must name an active config of the owner; otherwise the
    /// owner's default is used. No usable config is `ProviderConfigMissing`.
    async fn resolve(
        &self,
        owner_id: Uuid,
        config_id: Option<Uuid>,
    ) -> AppResult<AiProviderConfig> {
        let config = match config_id {
            Some(id) => self.get(owner_id, id).await.map_err(|e| {
                if e.code == ErrorCode::ResourceNotFound {
                    AppError::provider_config_missing(
                        "the selected AI provider configuration does not exist",
                    )
                } else {
                    e
                }
            })?,
            None => self
                .list(owner_id)
                .await?
                .into_iter()
                .find(|c| c.is_default)
                .ok_or_else(|| {
                    AppError::provider_config_missing(
                        "no AI provider is configured; add one before generating plans",
                    )
                })?,
        };

        ensure_usable(&config)?;
        Ok(config)
    }
}

fn ensure_usable(config: &AiProviderConfig) -> AppResult<()> {
    if !config.is_active {
        return Err(AppError::provider_config_missing(format!(
            "AI provider configuration '{}' is disabled",
            config.name
        )));
    }
    if config.provider.requires_secret() && !config.has_secret() {
        return Err(AppError::provider_config_missing(format!(
            "AI provider configuration '{}' has no stored credential",
            config.name
        )));
    }
    Ok(())
}

/// Decrypt a config's credential for a single client construction
///
/// # Errors
///
/// Returns an encryption error when the stored value cannot be decrypted
/// with this cipher for this owner and vendor.
pub fn decrypt_secret(
    cipher: &SecretCipher,
    config: &AiProviderConfig,
) -> AppResult<Option<Zeroizing<String>>> {
    if !config.has_secret() {
        return Ok(None);
    }
    let aad = credential_aad_context(config.owner_id, config.provider);
    cipher.decrypt(&config.encrypted_secret, &aad).map(Some)
}

/// Process-local provider config store
pub struct InMemoryProviderConfigStore {
    cipher: Arc<SecretCipher>,
    configs: DashMap<Uuid, Vec<AiProviderConfig>>,
}

impl InMemoryProviderConfigStore {
    /// Create an empty store encrypting with `cipher`
    #[must_use]
    pub fn new(cipher: Arc<SecretCipher>) -> Self {
        Self {
            cipher,
            configs: DashMap::new(),
        }
    }

    fn not_found(config_id: Uuid) -> AppError {
        AppError::not_found("AI provider configuration").with_resource_id(config_id.to_string())
    }

    /// Most recently updated config takes the default
    fn promote_default(configs: &mut [AiProviderConfig]) {
        if configs.iter().any(|c| c.is_default) {
            return;
        }
        if let Some(next) = configs.iter_mut().max_by_key(|c| c.updated_at) {
            next.is_default = true;
            next.updated_at = Utc::now();
            debug!(config_id = %next.id, "Promoted provider config to default");
        }
    }
}

#[async_trait]
impl ProviderConfigStore for InMemoryProviderConfigStore {
    async fn add(&self, owner_id: Uuid, config: NewProviderConfig) -> AppResult<AiProviderConfig> {
        if config.name.trim().is_empty() {
            return Err(AppError::missing_field("name"));
        }
        config.settings.validate(config.provider)?;

        let secret = config.secret.filter(|s| !s.trim().is_empty());
        if config.provider.requires_secret() && secret.is_none() {
            return Err(AppError::missing_field("secret"));
        }
        let encrypted_secret = match secret {
            Some(secret) => self.cipher.encrypt(
                secret.as_str(),
                &credential_aad_context(owner_id, config.provider),
            )?,
            None => String::new(),
        };

        let now = Utc::now();
        let mut stored = AiProviderConfig {
            id: Uuid::new_v4(),
            owner_id,
            provider: config.provider,
            name: config.name.trim().to_owned(),
            encrypted_secret,
            settings: config.settings,
            is_default: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut entry = self.configs.entry(owner_id).or_default();
        if config.make_default || entry.is_empty() {
            for existing in entry.iter_mut() {
                existing.is_default = false;
            }
            stored.is_default = true;
        }
        entry.push(stored.clone());
        drop(entry);

        info!(
            user.id = %owner_id,
            config_id = %stored.id,
            provider = %stored.provider,
            is_default = stored.is_default,
            "Stored AI provider configuration"
        );
        Ok(stored)
    }

    async fn get(&self, owner_id: Uuid, config_id: Uuid) -> AppResult<AiProviderConfig> {
        self.configs
            .get(&owner_id)
            .and_then(|configs| configs.iter().find(|c| c.id == config_id).cloned())
            .ok_or_else(|| Self::not_found(config_id))
    }

    async fn list(&self, owner_id: Uuid) -> AppResult<Vec<AiProviderConfig>> {
        let mut configs = self
            .configs
            .get(&owner_id)
            .map(|configs| configs.clone())
            .unwrap_or_default();
        configs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(configs)
    }

    async fn remove(&self, owner_id: Uuid, config_id: Uuid) -> AppResult<()> {
        let mut entry = self
            .configs
            .get_mut(&owner_id)
            .ok_or_else(|| Self::not_found(config_id))?;
        let position = entry
            .iter()
            .position(|c| c.id == config_id)
            .ok_or_else(|| Self::not_found(config_id))?;

        let removed = entry.remove(position);
        if removed.is_default {
            Self::promote_default(&mut entry);
        }
        drop(entry);

        info!(user.id = %owner_id, config_id = %config_id, "Removed AI provider configuration");
        Ok(())
    }

    async fn set_default(&self, owner_id: Uuid, config_id: Uuid) -> AppResult<AiProviderConfig> {
        let mut entry = self
            .configs
            .get_mut(&owner_id)
            .ok_or_else(|| Self::not_found(config_id))?;
        if !entry.iter().any(|c| c.id == config_id) {
            return Err(Self::not_found(config_id));
        }

        let now = Utc::now();
        let mut selected = None;
        for config in entry.iter_mut() {
            let is_target = config.id == config_id;
            if config.is_default != is_target {
                config.is_default = is_target;
                config.updated_at = now;
            }
            if is_target {
                selected = Some(config.clone());
            }
        }
        drop(entry);

        debug!(user.id = %owner_id, config_id = %config_id, "Default AI provider changed");
        selected.ok_or_else(|| Self::not_found(config_id))
    }

    async fn set_active(
        &self,
        owner_id: Uuid,
        config_id: Uuid,
        active: bool,
    ) -> AppResult<AiProviderConfig> {
        let mut entry = self
            .configs
            .get_mut(&owner_id)
            .ok_or_else(|| Self::not_found(config_id))?;
        let config = entry
            .iter_mut()
            .find(|c| c.id == config_id)
            .ok_or_else(|| Self::not_found(config_id))?;
        config.is_active = active;
        config.updated_at = Utc::now();
        Ok(config.clone())
    }
}
