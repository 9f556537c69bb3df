// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication tests.
//!
//! These tests verify that JWT tokens created at sign-in can be decoded
//! by the auth middleware, catching compatibility issues early.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use xp_tracker::middleware::auth::{create_jwt, verify_jwt, SESSION_TTL_SECS};
use xp_tracker::models::User;

/// Claims structure that must match what the middleware expects.
/// If either create_jwt or the middleware changes, this test should catch
/// the incompatibility.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    anon: bool,
    exp: usize,
    iat: usize,
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

#[test]
fn test_jwt_roundtrip() {
    let signing_key = b"test_signing_key_32_bytes_long!!";
    let user = User::new("firebase-uid-123", "runner@example.com");

    // Create token (like the sign-in routes do)
    let token = create_jwt(&user, signing_key).unwrap();

    // Decode with an independent Claims definition
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(&token, &key, &validation)
        .expect("Failed to decode JWT - check Claims struct compatibility");

    assert_eq!(token_data.claims.sub, "firebase-uid-123");
    assert_eq!(token_data.claims.email, "runner@example.com");
    assert!(!token_data.claims.anon);
    assert!(token_data.claims.exp > token_data.claims.iat);
}

#[test]
fn test_guest_token_marks_anonymous() {
    let signing_key = b"test_signing_key_32_bytes_long!!";
    let token = create_jwt(&User::guest("anon-uid"), signing_key).unwrap();

    let claims = verify_jwt(&token, signing_key).unwrap();
    assert_eq!(claims.sub, "anon-uid");
    assert!(claims.anon);
}

#[test]
fn test_jwt_expiration_is_future() {
    let signing_key = b"test_signing_key_32_bytes_long!!";
    let token = create_jwt(&User::new("u1", "u1@example.com"), signing_key).unwrap();

    let key = DecodingKey::from_secret(signing_key);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false; // We'll check manually

    let token_data = decode::<Claims>(&token, &key, &validation).unwrap();

    // Token should expire at least 29 days in the future
    assert!(
        token_data.claims.exp > now() + 86400 * 29,
        "Token expiration should be ~30 days in the future"
    );
    assert_eq!(
        token_data.claims.exp - token_data.claims.iat,
        SESSION_TTL_SECS
    );
}

#[test]
fn test_expired_token_rejected() {
    let signing_key = b"test_signing_key_32_bytes_long!!";
    let issued = now() - 86400 * 31;
    let claims = Claims {
        sub: "u1".to_string(),
        email: String::new(),
        anon: false,
        exp: issued + 86400 * 30,
        iat: issued,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap();

    assert!(verify_jwt(&token, signing_key).is_err());
}

#[test]
fn test_minimal_claims_still_decode() {
    // Tokens without the optional claims stay valid.
    #[derive(Serialize)]
    struct MinimalClaims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let signing_key = b"test_signing_key_32_bytes_long!!";
    let token = encode(
        &Header::new(Algorithm::HS256),
        &MinimalClaims {
            sub: "u1".to_string(),
            exp: now() + 3600,
            iat: now(),
        },
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap();

    let claims = verify_jwt(&token, signing_key).unwrap();
    assert_eq!(claims.sub, "u1");
    assert!(claims.email.is_empty());
    assert!(!claims.anon);
}
