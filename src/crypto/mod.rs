// ABOUTME: Cryptographic utilities for provider credential storage
// ABOUTME: AES-256-GCM secret cipher with owner-bound additional authenticated data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Credential encryption at rest
pub mod secrets;

pub use secrets::{credential_aad_context, SecretCipher};
