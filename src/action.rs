// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Closed set of privileged actions a credential or token can authorize.

use serde::{Deserialize, Serialize};

/// Purpose tag distinguishing what a single-use credential (or the token
/// carrying it) is allowed to do.
///
/// The set is closed: token `typ` headers are compared by exact string
/// equality against these tags and anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Confirming ownership of an email address after registration.
    EmailConfirmation,
    /// Redefining a forgotten password.
    PasswordReset,
}

impl ActionType {
    /// Token `typ` header value for this action.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ActionType::EmailConfirmation => "email-confirmation-token",
            ActionType::PasswordReset => "password-redefinition-token",
        }
    }

    /// Parse a `typ` header value back into an action.
    ///
    /// Returns `None` for anything outside the closed tag set.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "email-confirmation-token" => Some(ActionType::EmailConfirmation),
            "password-redefinition-token" => Some(ActionType::PasswordReset),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ActionType::EmailConfirmation => "email_confirmation",
            ActionType::PasswordReset => "password_reset",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for action in [ActionType::EmailConfirmation, ActionType::PasswordReset] {
            assert_eq!(ActionType::from_tag(action.type_tag()), Some(action));
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(ActionType::from_tag("refresh-token"), None);
        assert_eq!(ActionType::from_tag(""), None);
        assert_eq!(ActionType::from_tag("EMAIL-CONFIRMATION-TOKEN"), None);
    }
}
