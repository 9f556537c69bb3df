// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP Tracker API Server
//!
//! Serves the actions/rewards API, the XP ledger and sign-in on top of
//! Firestore and the identity provider.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xp_tracker::{
    config::{Config, StoreBackend},
    db::FirestoreDb,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        store = ?config.store_backend,
        repeat_policy = ?config.ledger.repeat,
        balance_writes = ?config.ledger.balance_writes,
        "Starting XP Tracker API"
    );

    if config.identity_api_key.is_empty() {
        tracing::warn!("IDENTITY_API_KEY is not set; sign-in requests will be rejected upstream");
    }

    let db = match config.store_backend {
        StoreBackend::Firestore => FirestoreDb::new(&config.gcp_project_id).await?,
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            FirestoreDb::new_in_memory()
        }
    };

    // Build shared state
    let state = Arc::new(AppState::from_config(config.clone(), db)?);

    // Build router
    let app = xp_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xp_tracker=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
