// ABOUTME: AES-256-GCM encryption of AI provider credentials at rest
// ABOUTME: Random 96-bit nonce prepended to ciphertext, base64 encoded, decrypts into Zeroizing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Secret Cipher
//!
//! Stored credentials are `base64(nonce || ciphertext)`. The additional
//! authenticated data binds each ciphertext to its owner and vendor, so a
//! value copied onto another user's config fails to decrypt.

use std::env;
use std::fmt;
use std::str::from_utf8;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pierre_plan_core::errors::{AppError, AppResult};
use pierre_plan_core::models::AiProvider;
use rand::RngCore;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

/// Environment variable holding the base64 master key
pub const MASTER_KEY_ENV: &str = "PIERRE_MASTER_ENCRYPTION_KEY";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Additional authenticated data for a stored provider credential
#[must_use]
pub fn credential_aad_context(owner_id: Uuid, provider: AiProvider) -> String {
    format!("pierre:ai_provider_config:{owner_id}:{}", provider.as_str())
}

/// Encrypts and decrypts provider credentials
pub struct SecretCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SecretCipher {
    /// Build a cipher from raw key bytes
    #[must_use]
    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Load the master key from the environment or generate one for development
    ///
    /// A generated key is never logged; credentials encrypted with it do not
    /// survive a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is set but is not base64 for exactly
    /// 32 bytes.
    pub fn load_or_generate() -> AppResult<Self> {
        match env::var(MASTER_KEY_ENV) {
            Ok(encoded) => {
                info!("Loading credential encryption key from environment");
                Self::from_base64(&encoded)
            }
            Err(_) => {
                warn!("{MASTER_KEY_ENV} not set; generating an ephemeral key for development");
                warn!("Stored provider credentials will not be readable after restart");
                Ok(Self::generate())
            }
        }
    }

    /// Build a cipher from a base64-encoded key
    ///
    /// # Errors
    ///
    /// Returns an error for invalid base64 or a key that is not 32 bytes.
    pub fn from_base64(encoded: &str) -> AppResult<Self> {
        let mut bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
            AppError::config(format!("{MASTER_KEY_ENV} is not valid base64: {e}"))
        })?;
        if bytes.len() != KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            return Err(AppError::config(format!(
                "{MASTER_KEY_ENV} must decode to {KEY_LEN} bytes, got {len}"
            )));
        }
        let mut key = [0_u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self::from_bytes(key))
    }

    /// Random key
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0_u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self::from_bytes(key)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(GenericArray::from_slice(self.key.as_slice()))
    }

    /// Encrypt a secret bound to `aad`
    ///
    /// # Errors
    ///
    /// Returns an encryption error if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &str, aad: &str) -> AppResult<String> {
        let mut nonce_bytes = [0_u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(
                GenericArray::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| AppError::encryption("credential encryption failed"))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    /// Decrypt a secret produced by [`Self::encrypt`] with the same `aad`
    ///
    /// # Errors
    ///
    /// Returns an encryption error for malformed input, a wrong key, a
    /// mismatched `aad`, or plaintext that is not UTF-8. The error never
    /// contains any part of the ciphertext or plaintext.
    pub fn decrypt(&self, encoded: &str, aad: &str) -> AppResult<Zeroizing<String>> {
        let combined = STANDARD
            .decode(encoded)
            .map_err(|_| AppError::encryption("stored credential is not valid base64"))?;
        if combined.len() <= NONCE_LEN {
            return Err(AppError::encryption("stored credential is truncated"));
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);

        let plaintext = Zeroizing::new(
            self.cipher()
                .decrypt(
                    GenericArray::from_slice(nonce),
                    Payload {
                        msg: ciphertext,
                        aad: aad.as_bytes(),
                    },
                )
                .map_err(|_| AppError::encryption("stored credential could not be decrypted"))?,
        );

        let text = from_utf8(&plaintext)
            .map_err(|_| AppError::encryption("stored credential is not valid UTF-8"))?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", SecretCipher::from_bytes([7; KEY_LEN]));
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains('7'));
    }

    #[test]
    fn test_nonce_makes_ciphertexts_distinct() {
        let cipher = SecretCipher::generate();
        let a = cipher.encrypt("sk-same", "ctx");
        let b = cipher.encrypt("sk-same", "ctx");
        assert!(a.is_ok() && b.is_ok());
        assert_ne!(a.ok(), b.ok());
    }
}
