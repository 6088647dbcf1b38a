// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Immutable configuration loaded once at startup and shared read-only
//! across concurrent calls. A malformed configuration is fatal: the
//! constructors return [`ConfigError`] and the process must not start.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_SIGNING_KEY` | Token signing secret, standard base64, >= 32 bytes decoded | Required |
//! | `AUTH_ENCRYPTION_KEY` | Token sealing secret, standard base64, exactly 32 bytes decoded | Required |
//! | `AUTH_CREDENTIAL_TTL_SECS` | Validity window for credentials and typed tokens | `900` |
//! | `AUTH_CODE_LENGTH` | Digit count of one-time codes (4..=10) | `6` |
//!
//! The signing and encryption keys are independent on purpose: rotating
//! one never requires rotating the other.

use std::env;

use chrono::Duration;

use base64ct::{Base64, Encoding};

/// Environment variable name for the token signing secret.
pub const SIGNING_KEY_ENV: &str = "AUTH_SIGNING_KEY";

/// Environment variable name for the token sealing secret.
pub const ENCRYPTION_KEY_ENV: &str = "AUTH_ENCRYPTION_KEY";

/// Environment variable name for the credential validity window.
pub const CREDENTIAL_TTL_ENV: &str = "AUTH_CREDENTIAL_TTL_SECS";

/// Environment variable name for the one-time code digit count.
pub const CODE_LENGTH_ENV: &str = "AUTH_CODE_LENGTH";

/// Default validity window: 15 minutes.
pub const DEFAULT_CREDENTIAL_TTL_SECS: i64 = 900;

/// Default one-time code width.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Minimum accepted signing key length in bytes (HS256 secret).
const MIN_SIGNING_KEY_LEN: usize = 32;

/// Required sealing key length in bytes (AES-256-GCM).
const ENCRYPTION_KEY_LEN: usize = 32;

/// Startup configuration error. Fatal, never recoverable at request time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("configuration value {name} is not valid base64")]
    NotBase64 { name: &'static str },

    #[error("signing key must be at least {MIN_SIGNING_KEY_LEN} bytes, got {0}")]
    SigningKeyTooShort(usize),

    #[error("encryption key must be exactly {ENCRYPTION_KEY_LEN} bytes, got {0}")]
    EncryptionKeyLength(usize),

    #[error("credential validity window must be a positive number of seconds")]
    InvalidValidityWindow,

    #[error("code length must be between 4 and 10 digits, got {0}")]
    InvalidCodeLength(usize),
}

/// Immutable process-wide configuration for the token codec and the
/// credential manager.
#[derive(Clone)]
pub struct AuthConfig {
    /// Symmetric secret for token signing (HS256).
    pub signing_key: Vec<u8>,
    /// Symmetric secret for token sealing (AES-256-GCM), independent of
    /// the signing key.
    pub encryption_key: [u8; ENCRYPTION_KEY_LEN],
    /// How long minted credentials and typed tokens stay valid.
    pub validity_window: Duration,
    /// Digit count of one-time codes.
    pub code_length: usize,
}

// Keys must never end up in logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_key", &"<redacted>")
            .field("encryption_key", &"<redacted>")
            .field("validity_window", &self.validity_window)
            .field("code_length", &self.code_length)
            .finish()
    }
}

impl AuthConfig {
    /// Build a configuration from raw key material with the default
    /// validity window and code length.
    pub fn new(signing_key: Vec<u8>, encryption_key: Vec<u8>) -> Result<Self, ConfigError> {
        Self::with_options(
            signing_key,
            encryption_key,
            Duration::seconds(DEFAULT_CREDENTIAL_TTL_SECS),
            DEFAULT_CODE_LENGTH,
        )
    }

    /// Build a configuration with explicit window and code length.
    pub fn with_options(
        signing_key: Vec<u8>,
        encryption_key: Vec<u8>,
        validity_window: Duration,
        code_length: usize,
    ) -> Result<Self, ConfigError> {
        if signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::SigningKeyTooShort(signing_key.len()));
        }
        let encryption_key: [u8; ENCRYPTION_KEY_LEN] = encryption_key
            .as_slice()
            .try_into()
            .map_err(|_| ConfigError::EncryptionKeyLength(encryption_key.len()))?;
        if validity_window <= Duration::zero() {
            return Err(ConfigError::InvalidValidityWindow);
        }
        if !(4..=10).contains(&code_length) {
            return Err(ConfigError::InvalidCodeLength(code_length));
        }

        Ok(Self {
            signing_key,
            encryption_key,
            validity_window,
            code_length,
        })
    }

    /// Load the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let signing_key = decode_key_env(SIGNING_KEY_ENV)?;
        let encryption_key = decode_key_env(ENCRYPTION_KEY_ENV)?;

        let ttl_secs = match env::var(CREDENTIAL_TTL_ENV) {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValidityWindow)?,
            Err(_) => DEFAULT_CREDENTIAL_TTL_SECS,
        };

        let code_length = match env::var(CODE_LENGTH_ENV) {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidCodeLength(0))?,
            Err(_) => DEFAULT_CODE_LENGTH,
        };

        Self::with_options(
            signing_key,
            encryption_key,
            Duration::seconds(ttl_secs),
            code_length,
        )
    }
}

fn decode_key_env(name: &'static str) -> Result<Vec<u8>, ConfigError> {
    let raw = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    Base64::decode_vec(raw.trim()).map_err(|_| ConfigError::NotBase64 { name })
}
