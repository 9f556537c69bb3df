// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider integration tests.
//!
//! A local axum server stands in for the Identity Toolkit REST API.
//! These tests verify that:
//! 1. Password sign-in returns the provider's uid
//! 2. An unknown email falls back to sign-up
//! 3. Provider error codes map to user-facing auth errors
//! 4. The auth routes establish a session and set the cookie

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use xp_tracker::config::Config;
use xp_tracker::db::FirestoreDb;
use xp_tracker::error::{AppError, AuthError};
use xp_tracker::middleware::auth::SESSION_COOKIE;
use xp_tracker::services::IdentityClient;

mod common;

fn provider_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "code": 400, "message": message } })),
    )
        .into_response()
}

/// Fake provider: `known@example.com` / `hunter22` exists, everything
/// else is unknown; sign-up rejects short passwords.
async fn fake_provider(uri: Uri, Json(body): Json<Value>) -> Response {
    if uri.query() != Some("key=test_api_key") {
        return provider_error("API key not valid. Please pass a valid API key.");
    }

    let email = body["email"].as_str();
    let password = body["password"].as_str().unwrap_or_default();

    match uri.path().rsplit('/').next().unwrap_or_default() {
        "accounts:signInWithPassword" => match email {
            Some("known@example.com") if password == "hunter22" => {
                Json(json!({ "localId": "uid-known", "email": "known@example.com" }))
                    .into_response()
            }
            Some("known@example.com") => provider_error("INVALID_LOGIN_CREDENTIALS"),
            Some("not-an-email") => provider_error("INVALID_EMAIL"),
            _ => provider_error("EMAIL_NOT_FOUND"),
        },
        "accounts:signUp" => match email {
            None => Json(json!({ "localId": "uid-anon" })).into_response(),
            Some(_) if password.len() < 6 => {
                provider_error("WEAK_PASSWORD : Password should be at least 6 characters")
            }
            Some(email) => Json(json!({ "localId": "uid-new", "email": email })).into_response(),
        },
        "accounts:signInWithIdp" => {
            if body["postBody"] == "id_token=google-token&providerId=google.com" {
                Json(json!({ "localId": "uid-google", "email": "g@example.com" }))
                    .into_response()
            } else {
                provider_error("INVALID_IDP_RESPONSE")
            }
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_provider() -> String {
    let base = common::spawn_upstream(Router::new().fallback(fake_provider)).await;
    format!("{}/v1", base)
}

async fn client() -> IdentityClient {
    IdentityClient::new(spawn_provider().await, "test_api_key", Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_sign_in_known_user() {
    let identity = client().await;

    let user = identity
        .sign_in("known@example.com", "hunter22")
        .await
        .unwrap();

    assert_eq!(user.uid, "uid-known");
    assert_eq!(user.email.as_deref(), Some("known@example.com"));
    assert!(!user.is_anonymous);
}

#[tokio::test]
async fn test_unknown_email_falls_back_to_sign_up() {
    let identity = client().await;

    let err = identity
        .sign_in("new@example.com", "secret123")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::UnknownUser)));

    let user = identity
        .sign_in_or_sign_up("new@example.com", "secret123")
        .await
        .unwrap();
    assert_eq!(user.uid, "uid-new");
    println!("✓ Unknown email creates the account");
}

#[tokio::test]
async fn test_provider_errors_are_mapped() {
    let identity = client().await;

    let err = identity
        .sign_in_or_sign_up("known@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));

    let err = identity.sign_in("not-an-email", "x").await.unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::InvalidEmail)));

    let err = identity
        .sign_in_or_sign_up("short@example.com", "abc")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::WeakPassword)));

    let err = identity
        .sign_in_with_google("forged", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::Provider(_))));
}

#[tokio::test]
async fn test_anonymous_and_google_sign_in() {
    let identity = client().await;

    let guest = identity.sign_in_anonymously().await.unwrap();
    assert_eq!(guest.uid, "uid-anon");
    assert!(guest.is_anonymous);
    assert!(guest.email.is_none());

    let google = identity
        .sign_in_with_google("google-token", Some("http://localhost:5173"))
        .await
        .unwrap();
    assert_eq!(google.uid, "uid-google");
}

#[tokio::test]
async fn test_wrong_api_key_is_provider_error() {
    let identity =
        IdentityClient::new(spawn_provider().await, "bogus", Duration::from_secs(2)).unwrap();

    let err = identity
        .sign_in("known@example.com", "hunter22")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::Provider(_))));
}

#[tokio::test]
async fn test_unreachable_provider_is_upstream_error() {
    let identity =
        IdentityClient::new("http://127.0.0.1:9/v1", "test_api_key", Duration::from_secs(2))
            .unwrap();

    let err = identity.sign_in_anonymously().await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));
}

async fn app_with_provider() -> (Router, std::sync::Arc<xp_tracker::AppState>) {
    let mut config = Config::test_default();
    config.identity_base_url = spawn_provider().await;
    common::create_test_app_with(config, FirestoreDb::new_in_memory())
}

#[tokio::test]
async fn test_guest_route_creates_guest_session() {
    let (app, state) = app_with_provider().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/guest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(!cookie.contains("Secure"));

    let json = common::read_json(response).await;
    assert_eq!(json["user"]["id"], "uid-anon");
    assert_eq!(json["user"]["is_guest"], true);
    assert_eq!(json["user"]["xp"], 0);
    assert!(json["token"].as_str().is_some());

    let stored = state.db.get_user("uid-anon").await.unwrap().unwrap();
    assert!(stored.is_guest);
    println!("✓ Guest sign-in creates a zero-balance guest user");
}

#[tokio::test]
async fn test_sign_in_route_keeps_existing_balance() {
    let (app, state) = app_with_provider().await;
    common::seed_user(&state.db, "uid-known", 42).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/signin")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "known@example.com", "password": "hunter22" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::read_json(response).await;
    assert_eq!(json["user"]["xp"], 42);
    assert_eq!(json["user"]["email"], "known@example.com");

    // The issued token authenticates API calls.
    let token = json["token"].as_str().unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::read_json(response).await;
    assert_eq!(json["id"], "uid-known");
}

#[tokio::test]
async fn test_sign_in_route_bad_password_is_unauthorized() {
    let (app, _) = app_with_provider().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/signin")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "known@example.com", "password": "nope" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = common::read_json(response).await;
    assert_eq!(json["error"], "auth_failed");
    assert_eq!(json["details"], "Incorrect email or password");
}
