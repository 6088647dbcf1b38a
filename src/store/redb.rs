// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded credential store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `credentials`: secret → serialized StoredCredential (JSON bytes)
//!
//! redb serializes writers, so the get-check-remove inside one write
//! transaction in [`RedbCredentialStore::take_by_secret`] is a single
//! atomic conditional delete — the property the single-use guarantee
//! rests on.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::action::ActionType;

use super::{CredentialStore, StoreResult, StoredCredential};

/// Primary table: secret → serialized StoredCredential (JSON bytes).
const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("credentials");

/// Persistent [`CredentialStore`] on an embedded redb database.
pub struct RedbCredentialStore {
    db: Database,
}

impl RedbCredentialStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CREDENTIALS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl CredentialStore for RedbCredentialStore {
    fn insert(&self, credential: &StoredCredential) -> StoreResult<()> {
        let json = serde_json::to_vec(credential)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            table.insert(credential.secret.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find_by_secret(&self, secret: &str) -> StoreResult<Option<StoredCredential>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;
        match table.get(secret)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn take_by_secret(
        &self,
        secret: &str,
        action: ActionType,
    ) -> StoreResult<Option<StoredCredential>> {
        let write_txn = self.db.begin_write()?;
        let taken = {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            let existing: Option<StoredCredential> = match table.get(secret)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            match existing {
                Some(credential) if credential.action == action => {
                    table.remove(secret)?;
                    Some(credential)
                }
                _ => None,
            }
        };
        write_txn.commit()?;
        Ok(taken)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(CREDENTIALS)?;

            // Guards borrow the table, so collect doomed keys first.
            let mut doomed = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let credential: StoredCredential = serde_json::from_slice(value.value())?;
                if credential.is_expired(now) {
                    doomed.push(key.value().to_string());
                }
            }

            for secret in &doomed {
                table.remove(secret.as_str())?;
            }
            doomed.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::credential;

    fn test_store() -> (RedbCredentialStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = RedbCredentialStore::open(&dir.path().join("credentials.redb"))
            .expect("Failed to open store");
        (store, dir)
    }

    #[test]
    fn insert_then_find() {
        let (store, _dir) = test_store();
        let cred = credential("u1", "042817", ActionType::EmailConfirmation, 900);
        store.insert(&cred).unwrap();

        let found = store.find_by_secret("042817").unwrap().unwrap();
        assert_eq!(found, cred);
        assert!(store.find_by_secret("000000").unwrap().is_none());
    }

    #[test]
    fn take_removes_exactly_once() {
        let (store, _dir) = test_store();
        let cred = credential("u1", "042817", ActionType::EmailConfirmation, 900);
        store.insert(&cred).unwrap();

        let taken = store
            .take_by_secret("042817", ActionType::EmailConfirmation)
            .unwrap();
        assert_eq!(taken.unwrap().subject_id, "u1");

        let again = store
            .take_by_secret("042817", ActionType::EmailConfirmation)
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn take_with_wrong_action_leaves_row() {
        let (store, _dir) = test_store();
        let cred = credential("u1", "042817", ActionType::PasswordReset, 900);
        store.insert(&cred).unwrap();

        assert!(store
            .take_by_secret("042817", ActionType::EmailConfirmation)
            .unwrap()
            .is_none());
        assert!(store
            .take_by_secret("042817", ActionType::PasswordReset)
            .unwrap()
            .is_some());
    }

    #[test]
    fn purge_drops_only_expired_rows() {
        let (store, _dir) = test_store();
        store
            .insert(&credential("u1", "111111", ActionType::EmailConfirmation, -5))
            .unwrap();
        store
            .insert(&credential("u2", "222222", ActionType::PasswordReset, 900))
            .unwrap();

        let purged = store.purge_expired(Utc::now()).unwrap();
        assert_eq!(purged, 1);
        assert!(store.find_by_secret("111111").unwrap().is_none());
        assert!(store.find_by_secret("222222").unwrap().is_some());
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.redb");

        let cred = credential("u1", "042817", ActionType::EmailConfirmation, 900);
        {
            let store = RedbCredentialStore::open(&path).unwrap();
            store.insert(&cred).unwrap();
        }

        let store = RedbCredentialStore::open(&path).unwrap();
        assert_eq!(store.find_by_secret("042817").unwrap().unwrap(), cred);
    }
}
