// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Explicit session context for an authenticated user.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::User;
use crate::services::identity::IdentityUser;

/// The signed-in user as seen by the current request.
///
/// The XP value is a snapshot: ledger operations compute new balances from
/// it and update it after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn xp(&self) -> u64 {
        self.user.xp
    }

    pub fn is_guest(&self) -> bool {
        self.user.is_guest
    }

    /// Replace the in-memory balance after a write.
    pub fn set_xp(&mut self, xp: u64) {
        self.user.xp = xp;
    }

    pub fn into_user(self) -> User {
        self.user
    }
}

/// Builds sessions from identities, creating user documents on first sight.
#[derive(Clone)]
pub struct SessionProvider {
    db: FirestoreDb,
}

impl SessionProvider {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Handle a fresh sign-in from the identity provider.
    ///
    /// Existing users keep their stored balance; the email always comes
    /// from the identity. Unknown users get a document with `xp = 0`.
    pub async fn establish(&self, identity: &IdentityUser) -> Result<Session, AppError> {
        if let Some(mut user) = self.db.get_user(&identity.uid).await? {
            if !identity.is_anonymous {
                user.email = identity.email.clone().unwrap_or_default();
            }
            tracing::debug!(user_id = %user.id, xp = user.xp, "Existing user signed in");
            return Ok(Session::new(user));
        }

        let user = if identity.is_anonymous {
            User::guest(&identity.uid)
        } else {
            User::new(&identity.uid, identity.email.clone().unwrap_or_default())
        };
        self.db.upsert_user(&user).await?;

        tracing::info!(
            user_id = %user.id,
            is_guest = user.is_guest,
            "Created user document"
        );

        Ok(Session::new(user))
    }

    /// Rebuild the session for an authenticated request.
    pub async fn resume(&self, auth: &AuthUser) -> Result<Session, AppError> {
        self.establish(&IdentityUser {
            uid: auth.user_id.clone(),
            email: (!auth.email.is_empty()).then(|| auth.email.clone()),
            is_anonymous: auth.is_guest,
        })
        .await
    }
}
