// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// Email recorded for anonymous (guest) accounts.
pub const GUEST_EMAIL: &str = "guest@example.com";

/// User profile stored in Firestore at `users/{id}`.
///
/// The document id is the identity provider's uid. The `id` field is also
/// written into the document body; older documents may lack it, so loaders
/// fill it from the document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    /// Email address (empty when the provider has none)
    #[serde(default)]
    pub email: String,
    /// Current XP balance
    #[serde(default)]
    pub xp: u64,
    /// Anonymous account
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_guest: bool,
}

impl User {
    /// A brand-new account with a zero balance.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            xp: 0,
            is_guest: false,
        }
    }

    /// A brand-new anonymous account.
    pub fn guest(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: GUEST_EMAIL.to_string(),
            xp: 0,
            is_guest: true,
        }
    }
}

/// Partial update that overwrites only the XP balance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalancePatch {
    pub xp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let user: User = serde_json::from_value(serde_json::json!({ "xp": 7 })).unwrap();
        assert_eq!(user.xp, 7);
        assert!(user.email.is_empty());
        assert!(!user.is_guest);
    }

    #[test]
    fn test_guest_flag_only_written_for_guests() {
        let regular = serde_json::to_value(User::new("u1", "a@b.c")).unwrap();
        assert!(regular.get("isGuest").is_none());

        let guest = serde_json::to_value(User::guest("u2")).unwrap();
        assert_eq!(guest["isGuest"], true);
        assert_eq!(guest["email"], GUEST_EMAIL);
    }
}
