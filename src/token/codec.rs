// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Builds and validates signed (optionally sealed) bearer tokens.
//!
//! Tokens are compact HS256 JWS strings; a typed token additionally
//! stamps the header `typ` with the action tag, and may be sealed by the
//! [`TokenSealer`](super::seal::TokenSealer) for confidentiality. The
//! signing and sealing keys are independent.
//!
//! Validation folds every failure — bad signature, expiry, wrong or
//! unknown `typ`, malformed structure, failed unseal — into the single
//! [`AuthError::InvalidToken`] outcome.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::action::ActionType;
use crate::config::AuthConfig;
use crate::error::AuthError;

use super::claims::{ClaimSet, TokenPayload, RESERVED_CLAIMS};
use super::seal::{SealError, TokenSealer};

/// Token construction failure. A programming or configuration error:
/// building a token from well-formed input is expected to always succeed.
#[derive(Debug, thiserror::Error)]
pub enum TokenBuildError {
    #[error("claim name {0:?} is reserved for the codec")]
    ReservedClaim(String),

    #[error("failed to encode token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Seal(#[from] SealError),
}

/// Stateless codec over immutable process-wide keys, safely shared
/// read-only across concurrent calls.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    sealer: TokenSealer,
}

impl TokenCodec {
    /// Build a codec from validated configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(&config.signing_key),
            decoding_key: DecodingKey::from_secret(&config.signing_key),
            sealer: TokenSealer::new(&config.encryption_key),
        }
    }

    /// Build a plain signed token carrying `claims`, expiring at
    /// `expires_at`.
    pub fn build_token(
        &self,
        claims: ClaimSet,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenBuildError> {
        self.sign(claims, Header::new(Algorithm::HS256), expires_at)
    }

    /// Build a token stamped with the action's `typ` tag so validation
    /// can reject tokens issued for a different purpose.
    ///
    /// `encrypt` is caller-controlled: anything embedding a
    /// human-enterable digit code must be sealed before it travels over a
    /// public channel, while purely-link tokens may skip the layer.
    pub fn build_typed_token(
        &self,
        claims: ClaimSet,
        action: ActionType,
        expires_at: DateTime<Utc>,
        encrypt: bool,
    ) -> Result<String, TokenBuildError> {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some(action.type_tag().to_string());

        let token = self.sign(claims, header, expires_at)?;
        if encrypt {
            Ok(self.sealer.seal(&token)?)
        } else {
            Ok(token)
        }
    }

    /// Verify a token and return its claim set.
    ///
    /// Sealed input is detected by shape (a compact JWS always contains
    /// `.`, a sealed blob never does) and opened first. When `expected`
    /// is set, the header `typ` must equal that action's tag; absent or
    /// unknown tags are rejected. Expiry uses the token's own `exp`
    /// claim with zero leeway — a token is accepted through its `exp`
    /// second and rejected after it.
    pub fn validate_token(
        &self,
        token: &str,
        expected: Option<ActionType>,
    ) -> Result<ClaimSet, AuthError> {
        let compact = if token.contains('.') {
            token.to_string()
        } else {
            self.sealer.open(token).map_err(|_| AuthError::InvalidToken)?
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        let data = decode::<TokenPayload>(&compact, &self.decoding_key, &validation)
            .map_err(|_| AuthError::InvalidToken)?;

        if let Some(action) = expected {
            let tag = data.header.typ.as_deref().ok_or(AuthError::InvalidToken)?;
            if ActionType::from_tag(tag) != Some(action) {
                return Err(AuthError::InvalidToken);
            }
        }

        Ok(data.claims.claims)
    }

    fn sign(
        &self,
        claims: ClaimSet,
        header: Header,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenBuildError> {
        for reserved in RESERVED_CLAIMS {
            if claims.contains_key(reserved) {
                return Err(TokenBuildError::ReservedClaim(reserved.to_string()));
            }
        }

        let payload = TokenPayload {
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            claims,
        };
        Ok(encode(&header, &payload, &self.encoding_key)?)
    }
}
