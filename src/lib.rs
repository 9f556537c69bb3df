// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP Tracker: earn XP by completing actions, spend it on rewards.
//!
//! This crate provides the backend API: owner-scoped collections of actions
//! and rewards kept in Firestore, the XP ledger that moves the balance, and
//! sign-in through the identity provider.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{IdentityClient, PointsLedger, SessionProvider, XpSuggester};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub sessions: SessionProvider,
    pub ledger: PointsLedger,
    pub identity: IdentityClient,
    pub suggester: XpSuggester,
}

impl AppState {
    /// Wire services over an already connected store.
    pub fn from_config(config: Config, db: FirestoreDb) -> anyhow::Result<Self> {
        let db = db.with_timeout(config.store_timeout);

        let identity = IdentityClient::new(
            config.identity_base_url.clone(),
            config.identity_api_key.clone(),
            config.http_timeout,
        )?;
        let suggester = XpSuggester::new(
            config.suggest_api_url.clone(),
            config.suggest_api_token.clone(),
            config.http_timeout,
        )?;

        Ok(Self {
            sessions: SessionProvider::new(db.clone()),
            ledger: PointsLedger::new(db.clone(), config.ledger),
            identity,
            suggester,
            db,
            config,
        })
    }
}
