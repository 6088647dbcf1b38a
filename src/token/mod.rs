// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Codec
//!
//! Construction and validation of bearer tokens: claim sets, issued-at
//! and expiry timestamps, a custom `typ` tag for purpose isolation, an
//! HS256 signature, and an optional confidentiality layer keyed
//! separately from the signature. See [`codec::TokenCodec`].

pub mod claims;
pub mod codec;
pub mod seal;

pub use claims::{claim_str, ClaimSet, ONE_TIME_CODE_CLAIM, SUBJECT_CLAIM};
pub use codec::{TokenBuildError, TokenCodec};
pub use seal::{SealError, TokenSealer};
