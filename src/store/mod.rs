// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Store
//!
//! Persistence contract for single-use credentials, plus the shipped
//! implementations:
//!
//! - [`InMemoryCredentialStore`] — process-local, for tests and
//!   single-instance deployments.
//! - [`RedbCredentialStore`] — embedded ACID database (redb).
//!
//! The store is the sole arbiter of single-use enforcement: consumption
//! goes through [`CredentialStore::take_by_secret`], a single atomic
//! conditional delete. Two concurrent takes of the same secret must
//! resolve to exactly one `Some` and one `None`.

pub mod memory;
pub mod redb;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionType;

pub use self::memory::InMemoryCredentialStore;
pub use self::redb::RedbCredentialStore;

/// Store backend error. `NotFound` is not modelled here: absence is an
/// ordinary `None` so callers cannot confuse it with a backend fault.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] ::redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] ::redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] ::redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] ::redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] ::redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] ::redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted single-use credential.
///
/// The row is keyed by `secret`; `id` exists so logs and audit trails can
/// reference a credential without ever recording the secret itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredential {
    /// Unique credential identifier (UUID), safe to log.
    pub id: String,
    /// Opaque identifier of the subject this credential grants access to.
    pub subject_id: String,
    /// The random value presented by the holder. Never logged.
    pub secret: String,
    /// The action this credential authorizes.
    pub action: ActionType,
    /// When the credential was minted.
    pub created_at: DateTime<Utc>,
    /// The credential is invalid at or after this instant.
    pub expires_at: DateTime<Utc>,
}

impl StoredCredential {
    /// Whether the validity window has lapsed at `now`.
    ///
    /// Pinned boundary: a credential is expired at exactly `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Persistence contract consumed by the credential manager.
///
/// Implementations must make `take_by_secret` atomic with respect to
/// concurrent callers; `insert` needs no uniqueness enforcement beyond
/// the natural key (the manager's generation policy guards collisions).
pub trait CredentialStore: Send + Sync {
    /// Persist a new credential row.
    fn insert(&self, credential: &StoredCredential) -> StoreResult<()>;

    /// Point lookup by secret, without consuming.
    fn find_by_secret(&self, secret: &str) -> StoreResult<Option<StoredCredential>>;

    /// Atomically remove and return the credential matching both `secret`
    /// and `action`. A row under the same secret but a different action is
    /// left untouched and `None` is returned. Removing an absent row is
    /// not an error.
    fn take_by_secret(
        &self,
        secret: &str,
        action: ActionType,
    ) -> StoreResult<Option<StoredCredential>>;

    /// Delete every row whose validity window has lapsed at `now`.
    /// Storage hygiene only; correctness never depends on this running.
    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<S> {
    fn insert(&self, credential: &StoredCredential) -> StoreResult<()> {
        (**self).insert(credential)
    }

    fn find_by_secret(&self, secret: &str) -> StoreResult<Option<StoredCredential>> {
        (**self).find_by_secret(secret)
    }

    fn take_by_secret(
        &self,
        secret: &str,
        action: ActionType,
    ) -> StoreResult<Option<StoredCredential>> {
        (**self).take_by_secret(secret, action)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        (**self).purge_expired(now)
    }
}
