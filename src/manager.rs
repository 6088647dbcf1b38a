// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-use credential manager: mints and redeems the store-backed
//! secrets behind confirmation codes and reset links.
//!
//! This is the state machine enforcing "at most once": a credential is
//! `Active` from mint until either a successful redemption consumes it
//! (delete-on-consume) or its validity window lapses. Expiry is a
//! time-based predicate evaluated at redemption, not a timer.

use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, info, warn};
use uuid::Uuid;

use base64ct::{Base64UrlUnpadded, Encoding};

use crate::action::ActionType;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::store::{CredentialStore, StoredCredential};

/// How many fresh secrets to try before giving up on a mint. A retry is
/// only ever needed when a generated secret collides with a live row.
const MINT_ATTEMPTS: usize = 8;

/// Entropy of opaque link-flow secrets, in bytes.
const OPAQUE_SECRET_LEN: usize = 32;

/// A freshly minted credential: the plaintext secret to hand to the
/// holder, plus the persisted row.
#[derive(Debug, Clone)]
pub struct MintedCredential {
    /// The plaintext secret. Embed it in a message or token, never log it.
    pub secret: String,
    pub credential: StoredCredential,
}

/// Mints and redeems single-use credentials against a [`CredentialStore`].
pub struct CredentialManager<S: CredentialStore> {
    store: S,
    validity_window: Duration,
    code_length: usize,
    rng: SystemRandom,
}

impl<S: CredentialStore> CredentialManager<S> {
    pub fn new(store: S, config: &AuthConfig) -> Self {
        Self {
            store,
            validity_window: config.validity_window,
            code_length: config.code_length,
            rng: SystemRandom::new(),
        }
    }

    /// Mint a fixed-width numeric code for code-flow delivery.
    pub fn mint_code(
        &self,
        subject_id: &str,
        action: ActionType,
    ) -> Result<MintedCredential, AuthError> {
        self.mint(subject_id, action, SecretFormat::Digits)
    }

    /// Mint a high-entropy opaque secret for embedding in a link token.
    pub fn mint_link_secret(
        &self,
        subject_id: &str,
        action: ActionType,
    ) -> Result<MintedCredential, AuthError> {
        self.mint(subject_id, action, SecretFormat::Opaque)
    }

    /// Redeem a secret for the subject identifier it is bound to.
    ///
    /// Exactly one concurrent caller can succeed for a given secret; the
    /// store's atomic take arbitrates. An expired credential is removed
    /// by the attempt itself and reported as [`AuthError::CredentialExpired`].
    /// A secret minted for a different action reports
    /// [`AuthError::CredentialNotFound`] — never that a different-purpose
    /// credential exists.
    pub fn redeem(&self, secret: &str, action: ActionType) -> Result<String, AuthError> {
        let Some(credential) = self.store.take_by_secret(secret, action)? else {
            debug!(%action, "redemption failed, no matching credential");
            return Err(AuthError::CredentialNotFound);
        };

        if credential.is_expired(Utc::now()) {
            // The take above already deleted the row: an expired
            // credential must never be redeemable, even if looked up
            // before a hygiene sweep.
            debug!(credential_id = %credential.id, %action, "redemption failed, credential expired");
            return Err(AuthError::CredentialExpired);
        }

        info!(credential_id = %credential.id, %action, "credential redeemed");
        Ok(credential.subject_id)
    }

    /// Delete expired rows. Storage hygiene only; redemption never
    /// depends on this running.
    pub fn purge_expired(&self) -> Result<usize, AuthError> {
        let purged = self.store.purge_expired(Utc::now())?;
        if purged > 0 {
            info!(purged, "purged expired credentials");
        }
        Ok(purged)
    }

    pub fn validity_window(&self) -> Duration {
        self.validity_window
    }

    fn mint(
        &self,
        subject_id: &str,
        action: ActionType,
        format: SecretFormat,
    ) -> Result<MintedCredential, AuthError> {
        for _ in 0..MINT_ATTEMPTS {
            let secret = match format {
                SecretFormat::Digits => random_code(&self.rng, self.code_length)?,
                SecretFormat::Opaque => random_opaque(&self.rng)?,
            };

            // Collision guard: `(subject, secret, action)` must stay
            // unique among live rows, and the store is keyed on the
            // secret alone.
            if self.store.find_by_secret(&secret)?.is_some() {
                continue;
            }

            let now = Utc::now();
            let credential = StoredCredential {
                id: Uuid::new_v4().to_string(),
                subject_id: subject_id.to_string(),
                secret: secret.clone(),
                action,
                created_at: now,
                expires_at: now + self.validity_window,
            };
            self.store.insert(&credential)?;

            debug!(credential_id = %credential.id, %action, "minted single-use credential");
            return Ok(MintedCredential { secret, credential });
        }

        warn!(%action, attempts = MINT_ATTEMPTS, "failed to mint a collision-free secret");
        Err(AuthError::SecretGeneration)
    }
}

#[derive(Clone, Copy)]
enum SecretFormat {
    Digits,
    Opaque,
}

/// Generate a zero-padded decimal code, uniform over its range.
///
/// Per-digit rejection sampling: a byte in `250..=255` is discarded so
/// `byte % 10` stays uniform.
fn random_code(rng: &SystemRandom, length: usize) -> Result<String, AuthError> {
    let mut code = String::with_capacity(length);
    while code.len() < length {
        let mut byte = [0u8; 1];
        rng.fill(&mut byte).map_err(|_| AuthError::SecretGeneration)?;
        if byte[0] < 250 {
            code.push(char::from(b'0' + byte[0] % 10));
        }
    }
    Ok(code)
}

/// Generate an opaque url-safe secret with [`OPAQUE_SECRET_LEN`] bytes of
/// entropy.
fn random_opaque(rng: &SystemRandom) -> Result<String, AuthError> {
    let mut bytes = [0u8; OPAQUE_SECRET_LEN];
    rng.fill(&mut bytes).map_err(|_| AuthError::SecretGeneration)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}
