// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::Response;
use std::sync::Arc;
use xp_tracker::config::Config;
use xp_tracker::db::FirestoreDb;
use xp_tracker::middleware::auth::create_jwt;
use xp_tracker::models::User;
use xp_tracker::routes::create_router;
use xp_tracker::services::{LedgerPolicy, PointsLedger, Session};
use xp_tracker::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Store a user document and return a session for it.
#[allow(dead_code)]
pub async fn seed_user(db: &FirestoreDb, id: &str, xp: u64) -> Session {
    let mut user = User::new(id, format!("{}@example.com", id));
    user.xp = xp;
    db.upsert_user(&user).await.expect("Failed to seed user");
    Session::new(user)
}

/// Ledger over `db` with the given policy.
#[allow(dead_code)]
pub fn ledger(db: &FirestoreDb, policy: LedgerPolicy) -> PointsLedger {
    PointsLedger::new(db.clone(), policy)
}

/// Create a test app backed by the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default(), FirestoreDb::new_in_memory())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config, db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::from_config(config, db).expect("Failed to build state"));
    (create_router(state.clone()), state)
}

/// Session token for `user`, signed with the app's key.
#[allow(dead_code)]
pub fn bearer(state: &AppState, user: &User) -> String {
    let token = create_jwt(user, &state.config.jwt_signing_key).expect("Failed to create JWT");
    format!("Bearer {}", token)
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Serve `router` on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_upstream(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind upstream");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", addr)
}
