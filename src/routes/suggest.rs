// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP suggestion endpoint.

use crate::error::{AppError, Result};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/suggest-xp", post(suggest_xp))
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuggestResponse {
    /// Suggested XP, or null when the model did not answer with a number
    pub xp: Option<u32>,
}

/// Suggest an XP value for an action title.
async fn suggest_xp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SuggestRequest>,
) -> Result<Json<SuggestResponse>> {
    let action = body
        .action
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AppError::BadRequest("Action is required".to_string()))?;

    let xp = state.suggester.suggest(action).await?;
    Ok(Json(SuggestResponse { xp }))
}
