// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim sets and the wire payload carried inside signed tokens.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Claim holding the subject identifier a typed token is bound to.
pub const SUBJECT_CLAIM: &str = "sub";

/// Claim holding the embedded one-time secret in link-flow tokens.
pub const ONE_TIME_CODE_CLAIM: &str = "x-digits-code";

/// Ordered set of caller claims embedded in a token.
///
/// The keys `exp`, `iat` and `nbf` are reserved for the codec; building a
/// token with one of them in the set is rejected as malformed input.
pub type ClaimSet = BTreeMap<String, serde_json::Value>;

/// Claim names managed by the codec itself.
pub(crate) const RESERVED_CLAIMS: [&str; 3] = ["exp", "iat", "nbf"];

/// Serialized token body: registered timestamps plus the caller claims
/// flattened alongside them.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TokenPayload {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    #[serde(flatten)]
    pub claims: ClaimSet,
}

/// Fetch a string-valued claim from a set.
pub fn claim_str<'a>(claims: &'a ClaimSet, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(|value| value.as_str())
}
