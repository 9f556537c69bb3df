// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity Toolkit REST client.
//!
//! Handles:
//! - Email/password sign-in and sign-up
//! - Anonymous (guest) accounts
//! - Google sign-in from a Google ID token
//!
//! Provider error codes are mapped to [`AuthError`] so the sign-in form can
//! show a useful message.

use crate::error::{AppError, AuthError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_REQUEST_URI: &str = "http://localhost";

/// Who the identity provider says signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUser {
    pub uid: String,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

/// Identity Toolkit API client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnonymousRequest {
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

/// Fields shared by every successful sign-in response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl IdentityClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityUser, AppError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: SignInResponse = self.call("accounts:signInWithPassword", &body).await?;
        Ok(response.into_user(false))
    }

    /// Create an email/password account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<IdentityUser, AppError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: SignInResponse = self.call("accounts:signUp", &body).await?;
        tracing::info!(uid = %response.local_id, "Account created");
        Ok(response.into_user(false))
    }

    /// Sign in, creating the account if the email is unknown.
    pub async fn sign_in_or_sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityUser, AppError> {
        match self.sign_in(email, password).await {
            Err(AppError::Auth(AuthError::UnknownUser)) => {
                tracing::debug!("Unknown email, falling back to sign-up");
                self.sign_up(email, password).await
            }
            other => other,
        }
    }

    /// Create an anonymous account.
    pub async fn sign_in_anonymously(&self) -> Result<IdentityUser, AppError> {
        let body = AnonymousRequest {
            return_secure_token: true,
        };
        let response: SignInResponse = self.call("accounts:signUp", &body).await?;
        Ok(response.into_user(true))
    }

    /// Exchange a Google ID token for a provider account.
    pub async fn sign_in_with_google(
        &self,
        id_token: &str,
        request_uri: Option<&str>,
    ) -> Result<IdentityUser, AppError> {
        let body = IdpRequest {
            post_body: format!("id_token={}&providerId=google.com", id_token),
            request_uri: request_uri.unwrap_or(DEFAULT_REQUEST_URI),
            return_secure_token: true,
            return_idp_credential: true,
        };
        let response: SignInResponse = self.call("accounts:signInWithIdp", &body).await?;
        Ok(response.into_user(false))
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout("identity provider".to_string())
                } else {
                    AppError::Upstream(format!("Identity request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| provider_code(&envelope.error.message).to_string())
                .unwrap_or_else(|_| format!("HTTP {}", status));
            tracing::warn!(method, status = status.as_u16(), code = %code, "Identity provider rejected request");
            return Err(map_provider_error(&code).into());
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Identity response parse error: {}", e)))
    }
}

impl SignInResponse {
    fn into_user(self, is_anonymous: bool) -> IdentityUser {
        IdentityUser {
            uid: self.local_id,
            email: self.email.filter(|e| !e.is_empty()),
            is_anonymous,
        }
    }
}

/// Error messages look like `WEAK_PASSWORD : Password should be ...`.
fn provider_code(message: &str) -> &str {
    message.split(" : ").next().unwrap_or(message).trim()
}

fn map_provider_error(code: &str) -> AuthError {
    match code {
        "EMAIL_NOT_FOUND" => AuthError::UnknownUser,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => AuthError::InvalidCredentials,
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthError::InvalidEmail,
        "EMAIL_EXISTS" => AuthError::EmailTaken,
        "WEAK_PASSWORD" => AuthError::WeakPassword,
        other => AuthError::Provider(other.to_string()),
    }
}
