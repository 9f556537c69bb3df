// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use crate::services::ledger::{BalanceWrites, LedgerPolicy, RepeatPolicy};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_SUGGEST_API_URL: &str =
    "https://api-inference.huggingface.co/models/distilgpt2";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Which document store backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Cloud Firestore (or the emulator when `FIRESTORE_EMULATOR_HOST` is set)
    Firestore,
    /// Process-local store, lost on restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Also allow any `http://localhost` or `http://127.0.0.1` origin
    pub cors_allow_localhost: bool,
    /// GCP project ID hosting Firestore
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Document store backend
    pub store_backend: StoreBackend,
    /// Identity Toolkit REST base URL
    pub identity_base_url: String,
    /// Web API key for the identity provider
    pub identity_api_key: String,
    /// Text-generation inference endpoint used for XP suggestions
    pub suggest_api_url: String,
    /// Bearer token for the inference endpoint
    pub suggest_api_token: Option<String>,
    /// How completions and redemptions touch the XP balance
    pub ledger: LedgerPolicy,
    /// Upper bound on a single store operation
    pub store_timeout: Duration,
    /// Upper bound on outbound HTTP calls
    pub http_timeout: Duration,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Config for tests: in-memory store, local URLs.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            cors_allow_localhost: true,
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            identity_base_url: "http://127.0.0.1:9099/identitytoolkit.googleapis.com/v1"
                .to_string(),
            identity_api_key: "test_api_key".to_string(),
            suggest_api_url: "http://127.0.0.1:9/suggest".to_string(),
            suggest_api_token: None,
            ledger: LedgerPolicy::default(),
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
            http_timeout: Duration::from_secs(2),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        // Local dev origins are allowed by default only for a local frontend.
        let cors_allow_localhost =
            parse_var("CORS_ALLOW_LOCALHOST", is_local_origin(&frontend_url))?;

        Ok(Self {
            frontend_url,
            cors_allow_localhost,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend: parse_var("STORE_BACKEND", StoreBackend::Firestore)?,
            identity_base_url: env::var("IDENTITY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_BASE_URL.to_string()),
            identity_api_key: env::var("IDENTITY_API_KEY")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            suggest_api_url: env::var("SUGGEST_API_URL")
                .unwrap_or_else(|_| DEFAULT_SUGGEST_API_URL.to_string()),
            suggest_api_token: env::var("HF_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            ledger: LedgerPolicy {
                repeat: parse_var("REPEAT_POLICY", RepeatPolicy::default())?,
                balance_writes: parse_var("BALANCE_WRITES", BalanceWrites::default())?,
            },
            store_timeout: Duration::from_secs(parse_var(
                "STORE_TIMEOUT_SECS",
                DEFAULT_STORE_TIMEOUT_SECS,
            )?),
            http_timeout: Duration::from_secs(parse_var(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }
}

/// Origins served from the developer's own machine.
pub fn is_local_origin(origin: &str) -> bool {
    origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1")
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
        _ => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
