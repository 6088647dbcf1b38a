// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application-facing flows: send a confirmation or reset message, then
//! confirm the email or reset the password with the code or link token
//! the holder presents.
//!
//! Two redemption variants are supported end to end:
//!
//! - **Code flow** — the secret is a short human-typed digit code,
//!   delivered raw and redeemed by store lookup.
//! - **Link flow** — an opaque secret is minted, embedded as a claim in a
//!   typed signed token, and the token rides a URL query parameter.
//!   Redeeming validates the token first, then still consumes the store
//!   row: a signed token alone is never single-use.
//!
//! The user directory and delivery channel are collaborator traits; this
//! crate reports the bound subject identifier and leaves the side effects
//! of confirmation and reset to the directory implementation.

use serde_json::Value;
use tracing::info;
use url::Url;

use crate::action::ActionType;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::manager::CredentialManager;
use crate::store::CredentialStore;
use crate::token::{claim_str, ClaimSet, TokenCodec, ONE_TIME_CODE_CLAIM, SUBJECT_CLAIM};

/// User directory backend failure.
#[derive(Debug, thiserror::Error)]
#[error("user directory error: {0}")]
pub struct DirectoryError(pub String);

/// Message delivery channel failure.
#[derive(Debug, thiserror::Error)]
#[error("message delivery error: {0}")]
pub struct DeliveryError(pub String);

/// A subject as known to the user directory.
#[derive(Debug, Clone)]
pub struct SubjectRecord {
    /// Opaque subject identifier.
    pub id: String,
    /// Delivery address for this subject.
    pub address: String,
}

/// The user directory collaborator. The core never stores user records;
/// it only resolves an address to a subject and reports side effects
/// back.
pub trait UserDirectory: Send + Sync {
    fn find_subject(&self, address: &str) -> Result<Option<SubjectRecord>, DirectoryError>;

    fn apply_confirmed_email(&self, subject_id: &str) -> Result<(), DirectoryError>;

    /// `password_hash` is a finished KDF output; hashing is the caller's
    /// concern.
    fn apply_new_password_hash(
        &self,
        subject_id: &str,
        password_hash: &str,
    ) -> Result<(), DirectoryError>;
}

/// The message delivery collaborator.
pub trait DeliveryChannel: Send + Sync {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

impl<D: UserDirectory + ?Sized> UserDirectory for std::sync::Arc<D> {
    fn find_subject(&self, address: &str) -> Result<Option<SubjectRecord>, DirectoryError> {
        (**self).find_subject(address)
    }

    fn apply_confirmed_email(&self, subject_id: &str) -> Result<(), DirectoryError> {
        (**self).apply_confirmed_email(subject_id)
    }

    fn apply_new_password_hash(
        &self,
        subject_id: &str,
        password_hash: &str,
    ) -> Result<(), DirectoryError> {
        (**self).apply_new_password_hash(subject_id, password_hash)
    }
}

impl<M: DeliveryChannel + ?Sized> DeliveryChannel for std::sync::Arc<M> {
    fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        (**self).send(address, subject, body)
    }
}

/// Builds a message body from the deliverable payload (the raw code, or
/// the assembled link).
pub type MessageBuilder = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Parameters for the issuance flows: where links point, whether link
/// tokens are sealed, and how messages are rendered.
pub struct FlowParams {
    /// App endpoint the confirmation link points at.
    pub confirmation_endpoint: Url,
    /// App endpoint the reset link points at.
    pub reset_endpoint: Url,
    /// Seal link tokens before delivery. Link secrets are high-entropy
    /// and the token is signed either way, so this defaults off; turn it
    /// on whenever a token would carry a guessable digit code.
    pub encrypt_link_tokens: bool,
    pub confirmation_subject: String,
    pub reset_subject: String,
    pub confirmation_body: MessageBuilder,
    pub reset_body: MessageBuilder,
}

impl FlowParams {
    /// Flow parameters with the default subjects and body templates.
    pub fn new(confirmation_endpoint: Url, reset_endpoint: Url) -> Self {
        Self {
            confirmation_endpoint,
            reset_endpoint,
            encrypt_link_tokens: false,
            confirmation_subject: "Confirm your email address".to_string(),
            reset_subject: "Reset your password".to_string(),
            confirmation_body: Box::new(|payload| {
                format!("Use the following to confirm your email address: {payload}")
            }),
            reset_body: Box::new(|payload| {
                format!("Use the following to reset your password: {payload}")
            }),
        }
    }
}

/// Orchestrates the send and redeem flows over the codec, the credential
/// manager and the collaborator traits.
pub struct AuthFlows<S, D, M>
where
    S: CredentialStore,
    D: UserDirectory,
    M: DeliveryChannel,
{
    codec: TokenCodec,
    credentials: CredentialManager<S>,
    directory: D,
    delivery: M,
    params: FlowParams,
}

impl<S, D, M> AuthFlows<S, D, M>
where
    S: CredentialStore,
    D: UserDirectory,
    M: DeliveryChannel,
{
    pub fn new(
        config: &AuthConfig,
        store: S,
        directory: D,
        delivery: M,
        params: FlowParams,
    ) -> Self {
        Self {
            codec: TokenCodec::new(config),
            credentials: CredentialManager::new(store, config),
            directory,
            delivery,
            params,
        }
    }

    /// Mint a confirmation code for the subject behind `address` and
    /// deliver it.
    pub fn send_confirmation_code(&self, address: &str) -> Result<(), AuthError> {
        self.send_code(address, ActionType::EmailConfirmation)
    }

    /// Mint a reset code for the subject behind `address` and deliver it.
    pub fn send_reset_code(&self, address: &str) -> Result<(), AuthError> {
        self.send_code(address, ActionType::PasswordReset)
    }

    /// Mint a link-flow credential, embed it in a typed token, and
    /// deliver the confirmation link.
    pub fn send_confirmation_link(&self, address: &str) -> Result<(), AuthError> {
        self.send_link(address, ActionType::EmailConfirmation)
    }

    /// Mint a link-flow credential, embed it in a typed token, and
    /// deliver the reset link.
    pub fn send_reset_link(&self, address: &str) -> Result<(), AuthError> {
        self.send_link(address, ActionType::PasswordReset)
    }

    /// Redeem a confirmation code and report the bound subject, whose
    /// email the directory has marked confirmed.
    pub fn confirm_email_with_code(&self, code: &str) -> Result<String, AuthError> {
        let subject_id = self
            .credentials
            .redeem(code, ActionType::EmailConfirmation)?;
        self.directory.apply_confirmed_email(&subject_id)?;
        Ok(subject_id)
    }

    /// Validate a confirmation link token, consume its credential, and
    /// report the bound subject.
    pub fn confirm_email_with_token(&self, token: &str) -> Result<String, AuthError> {
        let subject_id = self.redeem_token(token, ActionType::EmailConfirmation)?;
        self.directory.apply_confirmed_email(&subject_id)?;
        Ok(subject_id)
    }

    /// Redeem a reset code and hand the new password hash to the
    /// directory for the bound subject.
    pub fn reset_password_with_code(
        &self,
        code: &str,
        new_password_hash: &str,
    ) -> Result<String, AuthError> {
        let subject_id = self.credentials.redeem(code, ActionType::PasswordReset)?;
        self.directory
            .apply_new_password_hash(&subject_id, new_password_hash)?;
        Ok(subject_id)
    }

    /// Validate a reset link token, consume its credential, and hand the
    /// new password hash to the directory.
    pub fn reset_password_with_token(
        &self,
        token: &str,
        new_password_hash: &str,
    ) -> Result<String, AuthError> {
        let subject_id = self.redeem_token(token, ActionType::PasswordReset)?;
        self.directory
            .apply_new_password_hash(&subject_id, new_password_hash)?;
        Ok(subject_id)
    }

    /// The underlying credential manager, e.g. for hygiene sweeps.
    pub fn credentials(&self) -> &CredentialManager<S> {
        &self.credentials
    }

    fn send_code(&self, address: &str, action: ActionType) -> Result<(), AuthError> {
        let subject = self.find(address)?;
        let minted = self.credentials.mint_code(&subject.id, action)?;

        let (title, body) = self.render(action, &minted.secret);
        self.delivery.send(&subject.address, &title, &body)?;

        info!(credential_id = %minted.credential.id, %action, "sent single-use code");
        Ok(())
    }

    fn send_link(&self, address: &str, action: ActionType) -> Result<(), AuthError> {
        let subject = self.find(address)?;
        let minted = self.credentials.mint_link_secret(&subject.id, action)?;

        let mut claims = ClaimSet::new();
        claims.insert(SUBJECT_CLAIM.to_string(), Value::String(subject.id.clone()));
        claims.insert(
            ONE_TIME_CODE_CLAIM.to_string(),
            Value::String(minted.secret.clone()),
        );
        let token = self.codec.build_typed_token(
            claims,
            action,
            minted.credential.expires_at,
            self.params.encrypt_link_tokens,
        )?;

        let link = self.action_link(action, &token);
        let (title, body) = self.render(action, link.as_str());
        self.delivery.send(&subject.address, &title, &body)?;

        info!(credential_id = %minted.credential.id, %action, "sent single-use link");
        Ok(())
    }

    /// Validate a typed token, extract the embedded secret, and consume
    /// the paired store row. The token's subject claim must agree with
    /// the row; any disagreement is just an invalid token.
    fn redeem_token(&self, token: &str, action: ActionType) -> Result<String, AuthError> {
        let claims = self.codec.validate_token(token, Some(action))?;
        let secret = claim_str(&claims, ONE_TIME_CODE_CLAIM).ok_or(AuthError::InvalidToken)?;
        let token_subject = claim_str(&claims, SUBJECT_CLAIM).ok_or(AuthError::InvalidToken)?;

        let subject_id = self.credentials.redeem(secret, action)?;
        if subject_id != token_subject {
            return Err(AuthError::InvalidToken);
        }
        Ok(subject_id)
    }

    fn find(&self, address: &str) -> Result<SubjectRecord, AuthError> {
        self.directory
            .find_subject(address)?
            .ok_or(AuthError::SubjectNotFound)
    }

    fn action_link(&self, action: ActionType, token: &str) -> Url {
        let mut url = match action {
            ActionType::EmailConfirmation => self.params.confirmation_endpoint.clone(),
            ActionType::PasswordReset => self.params.reset_endpoint.clone(),
        };
        url.query_pairs_mut().append_pair("token", token);
        url
    }

    fn render(&self, action: ActionType, payload: &str) -> (String, String) {
        match action {
            ActionType::EmailConfirmation => (
                self.params.confirmation_subject.clone(),
                (self.params.confirmation_body)(payload),
            ),
            ActionType::PasswordReset => (
                self.params.reset_subject.clone(),
                (self.params.reset_body)(payload),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCredentialStore;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockDirectory {
        subjects: Vec<SubjectRecord>,
        confirmed: Mutex<Vec<String>>,
        password_hashes: Mutex<Vec<(String, String)>>,
    }

    impl MockDirectory {
        fn with_subject(id: &str, address: &str) -> Self {
            Self {
                subjects: vec![SubjectRecord {
                    id: id.to_string(),
                    address: address.to_string(),
                }],
                ..Default::default()
            }
        }
    }

    impl UserDirectory for MockDirectory {
        fn find_subject(&self, address: &str) -> Result<Option<SubjectRecord>, DirectoryError> {
            Ok(self
                .subjects
                .iter()
                .find(|subject| subject.address == address)
                .cloned())
        }

        fn apply_confirmed_email(&self, subject_id: &str) -> Result<(), DirectoryError> {
            self.confirmed.lock().unwrap().push(subject_id.to_string());
            Ok(())
        }

        fn apply_new_password_hash(
            &self,
            subject_id: &str,
            password_hash: &str,
        ) -> Result<(), DirectoryError> {
            self.password_hashes
                .lock()
                .unwrap()
                .push((subject_id.to_string(), password_hash.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingChannel {
        fn last_body(&self) -> String {
            self.sent.lock().unwrap().last().unwrap().2.clone()
        }
    }

    impl DeliveryChannel for RecordingChannel {
        fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push((
                address.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        }
    }

    type TestFlows =
        AuthFlows<InMemoryCredentialStore, Arc<MockDirectory>, Arc<RecordingChannel>>;

    /// Flows whose message bodies are exactly the deliverable payload, so
    /// tests can replay what a recipient would receive.
    fn flows(encrypt_link_tokens: bool) -> (TestFlows, Arc<MockDirectory>, Arc<RecordingChannel>) {
        let config = AuthConfig::new(vec![0x41; 32], vec![0x42; 32]).unwrap();
        let directory = Arc::new(MockDirectory::with_subject("u1", "u1@example.com"));
        let channel = Arc::new(RecordingChannel::default());

        let mut params = FlowParams::new(
            Url::parse("https://app.example.com/confirm-email").unwrap(),
            Url::parse("https://app.example.com/reset-password").unwrap(),
        );
        params.encrypt_link_tokens = encrypt_link_tokens;
        params.confirmation_body = Box::new(|payload| payload.to_string());
        params.reset_body = Box::new(|payload| payload.to_string());

        let flows = AuthFlows::new(
            &config,
            InMemoryCredentialStore::new(),
            directory.clone(),
            channel.clone(),
            params,
        );
        (flows, directory, channel)
    }

    fn token_from_link(body: &str) -> String {
        let url = Url::parse(body).unwrap();
        url.query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    #[test]
    fn code_flow_confirms_email_exactly_once() {
        let (flows, directory, channel) = flows(false);

        flows.send_confirmation_code("u1@example.com").unwrap();
        let code = channel.last_body();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let subject = flows.confirm_email_with_code(&code).unwrap();
        assert_eq!(subject, "u1");
        assert_eq!(*directory.confirmed.lock().unwrap(), vec!["u1"]);

        let replay = flows.confirm_email_with_code(&code);
        assert!(matches!(replay, Err(AuthError::CredentialNotFound)));
    }

    #[test]
    fn code_flow_resets_password() {
        let (flows, directory, channel) = flows(false);

        flows.send_reset_code("u1@example.com").unwrap();
        let code = channel.last_body();

        let subject = flows.reset_password_with_code(&code, "pbkdf2$new-hash").unwrap();
        assert_eq!(subject, "u1");
        assert_eq!(
            *directory.password_hashes.lock().unwrap(),
            vec![("u1".to_string(), "pbkdf2$new-hash".to_string())]
        );
    }

    #[test]
    fn link_flow_confirms_email_exactly_once() {
        let (flows, directory, channel) = flows(false);

        flows.send_confirmation_link("u1@example.com").unwrap();
        let body = channel.last_body();
        assert!(body.starts_with("https://app.example.com/confirm-email?token="));

        let token = token_from_link(&body);
        let subject = flows.confirm_email_with_token(&token).unwrap();
        assert_eq!(subject, "u1");
        assert_eq!(*directory.confirmed.lock().unwrap(), vec!["u1"]);

        // The token still verifies, but its credential is consumed.
        let replay = flows.confirm_email_with_token(&token);
        assert!(matches!(replay, Err(AuthError::CredentialNotFound)));
    }

    #[test]
    fn sealed_link_flow_round_trips() {
        let (flows, _directory, channel) = flows(true);

        flows.send_reset_link("u1@example.com").unwrap();
        let token = token_from_link(&channel.last_body());
        assert!(!token.contains('.'));

        let subject = flows
            .reset_password_with_token(&token, "pbkdf2$new-hash")
            .unwrap();
        assert_eq!(subject, "u1");
    }

    #[test]
    fn link_token_is_rejected_across_actions() {
        let (flows, directory, channel) = flows(false);

        flows.send_reset_link("u1@example.com").unwrap();
        let token = token_from_link(&channel.last_body());

        let result = flows.confirm_email_with_token(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
        assert!(directory.confirmed.lock().unwrap().is_empty());

        // The right flow still works afterwards.
        assert!(flows
            .reset_password_with_token(&token, "pbkdf2$new-hash")
            .is_ok());
    }

    #[test]
    fn unknown_address_is_subject_not_found() {
        let (flows, _directory, channel) = flows(false);

        let result = flows.send_confirmation_code("stranger@example.com");
        assert!(matches!(result, Err(AuthError::SubjectNotFound)));
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn forged_token_with_unminted_secret_is_rejected() {
        let (flows, _directory, _channel) = flows(false);

        // Signed by the right key but carrying a secret no store row
        // backs: the signed token alone must not grant anything.
        let config = AuthConfig::new(vec![0x41; 32], vec![0x42; 32]).unwrap();
        let codec = TokenCodec::new(&config);
        let mut claims = ClaimSet::new();
        claims.insert(SUBJECT_CLAIM.to_string(), Value::String("u1".to_string()));
        claims.insert(
            ONE_TIME_CODE_CLAIM.to_string(),
            Value::String("never-minted".to_string()),
        );
        let token = codec
            .build_typed_token(
                claims,
                ActionType::EmailConfirmation,
                chrono::Utc::now() + chrono::Duration::minutes(15),
                false,
            )
            .unwrap();

        let result = flows.confirm_email_with_token(&token);
        assert!(matches!(result, Err(AuthError::CredentialNotFound)));
    }
}
