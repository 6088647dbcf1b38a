// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory credential store.
//!
//! Backed by a mutex-guarded map keyed on the secret. The mutex makes
//! find-and-delete a single critical section, which is all the atomicity
//! the single-use guarantee needs in one process.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::action::ActionType;

use super::{CredentialStore, StoreResult, StoredCredential};

/// Process-local [`CredentialStore`] for tests and single-instance
/// deployments.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<HashMap<String, StoredCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live rows. Test and telemetry helper.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredCredential>> {
        // A poisoned mutex means a panic mid-insert/remove; the map itself
        // is still structurally sound, so keep serving.
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn insert(&self, credential: &StoredCredential) -> StoreResult<()> {
        self.lock()
            .insert(credential.secret.clone(), credential.clone());
        Ok(())
    }

    fn find_by_secret(&self, secret: &str) -> StoreResult<Option<StoredCredential>> {
        Ok(self.lock().get(secret).cloned())
    }

    fn take_by_secret(
        &self,
        secret: &str,
        action: ActionType,
    ) -> StoreResult<Option<StoredCredential>> {
        let mut credentials = self.lock();
        match credentials.get(secret) {
            Some(found) if found.action == action => Ok(credentials.remove(secret)),
            _ => Ok(None),
        }
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut credentials = self.lock();
        let before = credentials.len();
        credentials.retain(|_, cred| !cred.is_expired(now));
        Ok(before - credentials.len())
    }
}
