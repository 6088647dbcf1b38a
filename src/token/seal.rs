// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Confidentiality layer over signed tokens.
//!
//! A sealed token is AES-256-GCM over the compact JWS, encoded as
//! unpadded url-safe base64 of `nonce || ciphertext`. The encoding keeps
//! sealed tokens embeddable in URL query parameters, and its alphabet
//! contains no `.`, which is how the codec tells sealed input apart from
//! a plain three-segment JWS.
//!
//! The sealing key is independent of the signing key; rotating one never
//! forces rotating the other.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};

/// AES-GCM nonce width in bytes.
const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag width in bytes.
const TAG_LEN: usize = 16;

/// Sealing failure. Deliberately detail-free, like every other token
/// verification failure.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("failed to seal token")]
    Seal,
    #[error("failed to open sealed token")]
    Open,
}

/// Seals and opens token strings with a symmetric key.
pub struct TokenSealer {
    cipher: Aes256Gcm,
    rng: SystemRandom,
}

impl TokenSealer {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            rng: SystemRandom::new(),
        }
    }

    /// Encrypt a compact token under a fresh random nonce.
    pub fn seal(&self, token: &str) -> Result<String, SealError> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(|_| SealError::Seal)?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), token.as_bytes())
            .map_err(|_| SealError::Seal)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(Base64UrlUnpadded::encode_string(&blob))
    }

    /// Decrypt a sealed token back into its compact form.
    pub fn open(&self, sealed: &str) -> Result<String, SealError> {
        let blob = Base64UrlUnpadded::decode_vec(sealed).map_err(|_| SealError::Open)?;
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(SealError::Open);
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SealError::Open)?;
        String::from_utf8(plaintext).map_err(|_| SealError::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealer() -> TokenSealer {
        TokenSealer::new(&[0x42; 32])
    }

    #[test]
    fn seal_open_round_trip() {
        let sealer = sealer();
        let sealed = sealer.seal("header.payload.signature").unwrap();
        assert_eq!(sealer.open(&sealed).unwrap(), "header.payload.signature");
    }

    #[test]
    fn sealed_output_is_url_safe_and_dot_free() {
        let sealer = sealer();
        let sealed = sealer.seal("header.payload.signature").unwrap();
        assert!(sealed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn fresh_nonce_per_seal() {
        let sealer = sealer();
        let a = sealer.seal("same input").unwrap();
        let b = sealer.seal("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_blob_rejected() {
        let sealer = sealer();
        let sealed = sealer.seal("header.payload.signature").unwrap();

        let mut bytes: Vec<char> = sealed.chars().collect();
        let mid = bytes.len() / 2;
        bytes[mid] = if bytes[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = bytes.into_iter().collect();

        assert!(sealer.open(&tampered).is_err());
    }

    #[test]
    fn wrong_key_rejected() {
        let sealed = sealer().seal("header.payload.signature").unwrap();
        let other = TokenSealer::new(&[0x43; 32]);
        assert!(other.open(&sealed).is_err());
    }

    #[test]
    fn garbage_rejected() {
        let sealer = sealer();
        assert!(sealer.open("").is_err());
        assert!(sealer.open("!!!not-base64!!!").is_err());
        assert!(sealer.open("dG9vc2hvcnQ").is_err());
    }
}
