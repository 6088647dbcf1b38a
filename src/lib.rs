// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational AuthKit - Token & Single-Use Credential Core
//!
//! Library core for identity platforms: issues and validates signed
//! (optionally sealed) bearer tokens, and manages short-lived single-use
//! credentials for privileged actions such as email confirmation and
//! password reset.
//!
//! ## Modules
//!
//! - `token` - Bearer-token codec (claims, signature, `typ` tags, sealing)
//! - `store` - Credential store contract plus in-memory and redb backends
//! - `manager` - Mint/redeem state machine enforcing exactly-once use
//! - `issuance` - Send/confirm/reset flows over directory and delivery traits
//! - `config` - Immutable startup configuration
//! - `error` - `AuthError` taxonomy
//!
//! The crate is a synchronous library: request handlers in the enclosing
//! application call it directly, and the credential store is the only
//! shared mutable resource.

pub mod action;
pub mod config;
pub mod error;
pub mod issuance;
pub mod manager;
pub mod store;
pub mod token;

pub use action::ActionType;
pub use config::{AuthConfig, ConfigError};
pub use error::AuthError;
pub use issuance::{
    AuthFlows, DeliveryChannel, DeliveryError, DirectoryError, FlowParams, SubjectRecord,
    UserDirectory,
};
pub use manager::{CredentialManager, MintedCredential};
pub use store::{
    CredentialStore, InMemoryCredentialStore, RedbCredentialStore, StoreError, StoredCredential,
};
pub use token::{ClaimSet, TokenCodec};
