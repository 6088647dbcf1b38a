// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy for token validation, credential redemption and the
//! issuance flows.
//!
//! Redemption and validation failures are ordinary typed results, never
//! panics. `InvalidToken` deliberately carries no detail: signature
//! mismatch, expiry, wrong `typ` and malformed structure all collapse into
//! it so a caller (or an attacker probing one) cannot learn which check
//! failed. Applications must likewise surface `InvalidToken`,
//! `CredentialNotFound` and `CredentialExpired` uniformly to
//! unauthenticated clients.

use crate::issuance::{DeliveryError, DirectoryError};
use crate::store::StoreError;
use crate::token::TokenBuildError;

/// Errors produced by the credential manager and issuance façade.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token verification failed. Never subdivided.
    #[error("token is invalid")]
    InvalidToken,

    /// No active credential matches the presented secret. Covers "never
    /// existed", "already consumed" and "minted for a different action".
    #[error("credential not found")]
    CredentialNotFound,

    /// The secret matched a credential whose validity window has lapsed.
    /// The credential is removed by the attempt.
    #[error("credential expired")]
    CredentialExpired,

    /// No subject in the user directory matches the given criteria.
    #[error("subject not found")]
    SubjectNotFound,

    /// The secure random source failed or no collision-free secret could
    /// be minted. Not expected to occur in a healthy process.
    #[error("failed to generate a credential secret")]
    SecretGeneration,

    /// Credential store backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Token construction failure. A programming or configuration error,
    /// not a user-facing condition.
    #[error(transparent)]
    TokenBuild(#[from] TokenBuildError),

    /// User directory backend failure.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Message delivery channel failure.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
