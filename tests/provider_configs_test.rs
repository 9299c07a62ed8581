// ABOUTME: Tests for the provider configuration store and credential encryption
// ABOUTME: Unique default per user, resolution rules and owner-bound ciphertexts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use anyhow::Result;
use pierre_plan_core::errors::ErrorCode;
use pierre_plan_core::models::{AiProvider, AiProviderConfig};
use pierre_plan_generator::crypto::SecretCipher;
use pierre_plan_generator::provider_configs::{
    decrypt_secret, InMemoryProviderConfigStore, NewProviderConfig, ProviderConfigStore,
};
use uuid::Uuid;

const SECRET: &str = "sk-test-abcdef0123456789";

fn setup() -> (Arc<SecretCipher>, InMemoryProviderConfigStore) {
    common::init_test_logging();
    let cipher = Arc::new(SecretCipher::generate());
    let store = InMemoryProviderConfigStore::new(Arc::clone(&cipher));
    (cipher, store)
}

fn defaults(configs: &[AiProviderConfig]) -> Vec<Uuid> {
    configs.iter().filter(|c| c.is_default).map(|c| c.id).collect()
}

#[tokio::test]
async fn test_first_config_becomes_default() -> Result<()> {
    let (_, store) = setup();
    let owner = Uuid::new_v4();

    let first = store
        .add(owner, NewProviderConfig::new(AiProvider::OpenAi, "work").with_secret(SECRET))
        .await?;
    let second = store
        .add(owner, NewProviderConfig::new(AiProvider::Anthropic, "home").with_secret(SECRET))
        .await?;

    assert!(first.is_default);
    assert!(!second.is_default);
    assert_eq!(defaults(&store.list(owner).await?), vec![first.id]);
    Ok(())
}

#[tokio::test]
async fn test_default_stays_unique_across_changes() -> Result<()> {
    let (_, store) = setup();
    let owner = Uuid::new_v4();

    let mut ids = Vec::new();
    for (provider, name) in [
        (AiProvider::OpenAi, "a"),
        (AiProvider::Anthropic, "b"),
        (AiProvider::Gemini, "c"),
    ] {
        ids.push(
            store
                .add(owner, NewProviderConfig::new(provider, name).with_secret(SECRET))
                .await?
                .id,
        );
    }

    for target in [ids[2], ids[0], ids[1], ids[1], ids[2]] {
        store.set_default(owner, target).await?;
        assert_eq!(defaults(&store.list(owner).await?), vec![target]);
    }

    let forced = store
        .add(
            owner,
            NewProviderConfig::new(AiProvider::Groq, "d")
                .with_secret(SECRET)
                .as_default(),
        )
        .await?;
    assert_eq!(defaults(&store.list(owner).await?), vec![forced.id]);
    Ok(())
}

#[tokio::test]
async fn test_removing_default_promotes_another() -> Result<()> {
    let (_, store) = setup();
    let owner = Uuid::new_v4();
    let first = store
        .add(owner, NewProviderConfig::new(AiProvider::OpenAi, "a").with_secret(SECRET))
        .await?;
    let second = store
        .add(owner, NewProviderConfig::new(AiProvider::Anthropic, "b").with_secret(SECRET))
        .await?;

    store.remove(owner, first.id).await?;

    assert_eq!(defaults(&store.list(owner).await?), vec![second.id]);
    store.remove(owner, second.id).await?;
    assert!(store.list(owner).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_configs_are_scoped_to_owner() -> Result<()> {
    let (_, store) = setup();
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    let config = store
        .add(owner, NewProviderConfig::new(AiProvider::OpenAi, "a").with_secret(SECRET))
        .await?;

    assert_eq!(
        store.get(other, config.id).await.unwrap_err().code,
        ErrorCode::ResourceNotFound
    );
    assert!(store.set_default(other, config.id).await.is_err());
    assert!(store.remove(other, config.id).await.is_err());
    assert!(store.list(other).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_secret_is_encrypted_at_rest_and_round_trips() -> Result<()> {
    let (cipher, store) = setup();
    let owner = Uuid::new_v4();
    let config = store
        .add(owner, NewProviderConfig::new(AiProvider::OpenAi, "a").with_secret(SECRET))
        .await?;

    assert!(config.has_secret());
    assert!(!config.encrypted_secret.contains(SECRET));

    let plain = decrypt_secret(&cipher, &config)?;
    assert_eq!(plain.as_deref().map(String::as_str), Some(SECRET));
    Ok(())
}

#[tokio::test]
async fn test_ciphertext_copied_to_another_owner_fails() -> Result<()> {
    let (cipher, store) = setup();
    let config = store
        .add(
            Uuid::new_v4(),
            NewProviderConfig::new(AiProvider::OpenAi, "a").with_secret(SECRET),
        )
        .await?;

    let mut stolen = config.clone();
    stolen.owner_id = Uuid::new_v4();
    assert!(decrypt_secret(&cipher, &stolen).is_err());

    let mut other_vendor = config;
    other_vendor.provider = AiProvider::DeepSeek;
    assert!(decrypt_secret(&cipher, &other_vendor).is_err());
    Ok(())
}

#[tokio::test]
async fn test_add_requires_name_and_secret() -> Result<()> {
    let (_, store) = setup();
    let owner = Uuid::new_v4();

    let unnamed = store
        .add(owner, NewProviderConfig::new(AiProvider::OpenAi, "  ").with_secret(SECRET))
        .await;
    let no_secret = store
        .add(owner, NewProviderConfig::new(AiProvider::Anthropic, "a").with_secret("   "))
        .await;

    assert!(unnamed.is_err());
    assert!(no_secret.is_err());
    assert!(store.list(owner).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_resolve_prefers_explicit_then_default() -> Result<()> {
    let (_, store) = setup();
    let owner = Uuid::new_v4();

    let missing = store.resolve(owner, None).await.unwrap_err();
    assert_eq!(missing.code, ErrorCode::ProviderConfigMissing);

    let default = store
        .add(owner, NewProviderConfig::new(AiProvider::OpenAi, "a").with_secret(SECRET))
        .await?;
    let other = store
        .add(owner, NewProviderConfig::new(AiProvider::Gemini, "b").with_secret(SECRET))
        .await?;

    assert_eq!(store.resolve(owner, None).await?.id, default.id);
    assert_eq!(store.resolve(owner, Some(other.id)).await?.id, other.id);

    let unknown = store.resolve(owner, Some(Uuid::new_v4())).await.unwrap_err();
    assert_eq!(unknown.code, ErrorCode::ProviderConfigMissing);

    store.set_active(owner, other.id, false).await?;
    let disabled = store.resolve(owner, Some(other.id)).await.unwrap_err();
    assert_eq!(disabled.code, ErrorCode::ProviderConfigMissing);
    Ok(())
}

#[test]
fn test_cipher_from_base64_rejects_wrong_key_lengths() {
    assert!(SecretCipher::from_base64("c2hvcnQ=").is_err());
    assert!(SecretCipher::from_base64("not base64 at all!").is_err());
    assert!(SecretCipher::from_base64(&"A".repeat(44)).is_err());
}
