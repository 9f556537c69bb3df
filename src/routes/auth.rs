// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in routes backed by the identity provider.
//!
//! Every successful sign-in establishes the session (creating the user
//! document on first sight), then issues a session JWT both as an HttpOnly
//! cookie and in the response body.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::routes::api::UserResponse;
use crate::services::identity::IdentityUser;
use crate::AppState;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signin", post(sign_in))
        .route("/auth/signup", post(sign_up))
        .route("/auth/google", post(google_sign_in))
        .route("/auth/guest", post(guest_sign_in))
        .route("/auth/logout", post(logout))
}

/// Email/password form body.
#[derive(Deserialize, Validate)]
pub struct CredentialsRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Google sign-in body: an ID token obtained by the frontend.
#[derive(Deserialize, Validate)]
pub struct GoogleSignInRequest {
    #[validate(length(min = 1))]
    pub id_token: String,
    #[serde(default)]
    pub request_uri: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Sign in; an unknown email creates the account.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    body.validate()?;
    let identity = state
        .identity
        .sign_in_or_sign_up(&body.email, &body.password)
        .await?;
    start_session(&state, jar, &identity).await
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    body.validate()?;
    let identity = state.identity.sign_up(&body.email, &body.password).await?;
    start_session(&state, jar, &identity).await
}

async fn google_sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    body.validate()?;
    let identity = state
        .identity
        .sign_in_with_google(&body.id_token, body.request_uri.as_deref())
        .await?;
    start_session(&state, jar, &identity).await
}

async fn guest_sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let identity = state.identity.sign_in_anonymously().await?;
    start_session(&state, jar, &identity).await
}

/// Clear the session cookie.
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

async fn start_session(
    state: &AppState,
    jar: CookieJar,
    identity: &IdentityUser,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let session = state.sessions.establish(identity).await?;
    let user = session.into_user();

    let token = create_jwt(&user, &state.config.jwt_signing_key).map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.id, is_guest = user.is_guest, "Session started");

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(!state.config.frontend_url.starts_with("http://"))
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30));

    Ok((
        jar.add(cookie),
        Json(SessionResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}
