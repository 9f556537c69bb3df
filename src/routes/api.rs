// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.
//!
//! Each request resumes the caller's session and loads the caller's own
//! collection; item ids that are not in it are reported as not found.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Action, ActionPatch, NewAction, NewReward, Reward, RewardPatch, User};
use crate::services::{Actions, LedgerReceipt, Rewards};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/actions", get(list_actions).post(create_action))
        .route(
            "/api/actions/{id}",
            patch(update_action).delete(delete_action),
        )
        .route("/api/actions/{id}/complete", post(complete_action))
        .route("/api/actions/{id}/repeat", post(repeat_action))
        .route("/api/rewards", get(list_rewards).post(create_reward))
        .route(
            "/api/rewards/{id}",
            patch(update_reward).delete(delete_reward),
        )
        .route("/api/rewards/{id}/redeem", post(redeem_reward))
        .route("/api/rewards/{id}/repeat", post(repeat_reward))
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
    pub is_guest: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            xp: user.xp,
            is_guest: user.is_guest,
        }
    }
}

/// Get current user profile and balance.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let session = state.sessions.resume(&user).await?;
    Ok(Json(UserResponse::from(session.into_user())))
}

// ─── Actions ─────────────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActionResponse {
    pub id: String,
    pub title: String,
    pub xp: u32,
    pub completed: bool,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<Action> for ActionResponse {
    fn from(action: Action) -> Self {
        Self {
            id: action.id,
            title: action.title,
            xp: action.xp,
            completed: action.completed,
            created_at: format_utc_rfc3339(action.created_at),
            completed_at: action.completed_at.map(format_utc_rfc3339),
        }
    }
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActionsResponse {
    pub actions: Vec<ActionResponse>,
    /// Id of the action created by this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<String>,
}

/// Ledger result: new balance plus the reloaded list.
#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActionLedgerResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub previous_xp: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
    pub actions: Vec<ActionResponse>,
}

#[derive(Deserialize, Validate)]
pub struct CreateActionRequest {
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[validate(range(min = 1))]
    pub xp: u32,
}

#[derive(Deserialize, Validate)]
pub struct UpdateActionRequest {
    #[validate(custom(function = "not_blank"))]
    pub title: Option<String>,
    #[validate(range(min = 1))]
    pub xp: Option<u32>,
}

async fn load_actions(state: &AppState, user: &AuthUser) -> Result<Actions> {
    Actions::load(state.db.clone(), Some(user.user_id.clone())).await
}

async fn actions_response(actions: &Actions, created_id: Option<String>) -> ActionsResponse {
    ActionsResponse {
        actions: actions
            .display_order()
            .await
            .into_iter()
            .map(ActionResponse::from)
            .collect(),
        created_id,
    }
}

async fn action_ledger_response(actions: &Actions, receipt: LedgerReceipt) -> ActionLedgerResponse {
    ActionLedgerResponse {
        previous_xp: receipt.previous_xp,
        xp: receipt.xp,
        actions: actions_response(actions, None).await.actions,
    }
}

/// List the caller's actions, incomplete first.
async fn list_actions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ActionsResponse>> {
    let actions = load_actions(&state, &user).await?;
    Ok(Json(actions_response(&actions, None).await))
}

async fn create_action(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateActionRequest>,
) -> Result<(StatusCode, Json<ActionsResponse>)> {
    body.validate()?;
    let actions = Actions::for_owner(state.db.clone(), Some(user.user_id.clone()));
    let id = actions
        .add_item(&NewAction::new(&user.user_id, body.title.trim(), body.xp))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(actions_response(&actions, Some(id)).await),
    ))
}

async fn update_action(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateActionRequest>,
) -> Result<Json<ActionsResponse>> {
    body.validate()?;
    let patch = ActionPatch::edit(body.title.map(|t| t.trim().to_string()), body.xp);
    if patch.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let actions = load_actions(&state, &user).await?;
    actions.require(&id).await?;
    actions.update_item(&id, &patch).await?;
    Ok(Json(actions_response(&actions, None).await))
}

async fn delete_action(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ActionsResponse>> {
    let actions = load_actions(&state, &user).await?;
    actions.require(&id).await?;
    actions.delete_item(&id).await?;
    Ok(Json(actions_response(&actions, None).await))
}

/// Complete an action and credit its XP.
async fn complete_action(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ActionLedgerResponse>> {
    let mut session = state.sessions.resume(&user).await?;
    let actions = load_actions(&state, &user).await?;
    let action = actions.require(&id).await?;

    let receipt = state
        .ledger
        .complete_action(&mut session, &actions, &action)
        .await?;
    Ok(Json(action_ledger_response(&actions, receipt).await))
}

/// Put a completed action back on the list.
async fn repeat_action(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ActionLedgerResponse>> {
    let mut session = state.sessions.resume(&user).await?;
    let actions = load_actions(&state, &user).await?;
    let action = actions.require(&id).await?;

    let receipt = state
        .ledger
        .repeat_action(&mut session, &actions, &action)
        .await?;
    Ok(Json(action_ledger_response(&actions, receipt).await))
}

// ─── Rewards ─────────────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RewardResponse {
    pub id: String,
    pub title: String,
    pub xp_cost: u32,
    pub redeemed: bool,
    pub created_at: String,
    pub redeemed_at: Option<String>,
}

impl From<Reward> for RewardResponse {
    fn from(reward: Reward) -> Self {
        Self {
            id: reward.id,
            title: reward.title,
            xp_cost: reward.xp_cost,
            redeemed: reward.redeemed,
            created_at: format_utc_rfc3339(reward.created_at),
            redeemed_at: reward.redeemed_at.map(format_utc_rfc3339),
        }
    }
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RewardsResponse {
    pub rewards: Vec<RewardResponse>,
    /// Id of the reward created by this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<String>,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RewardLedgerResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub previous_xp: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
    pub rewards: Vec<RewardResponse>,
}

#[derive(Deserialize, Validate)]
pub struct CreateRewardRequest {
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[validate(range(min = 1))]
    pub xp_cost: u32,
}

#[derive(Deserialize, Validate)]
pub struct UpdateRewardRequest {
    #[validate(custom(function = "not_blank"))]
    pub title: Option<String>,
    #[validate(range(min = 1))]
    pub xp_cost: Option<u32>,
}

async fn load_rewards(state: &AppState, user: &AuthUser) -> Result<Rewards> {
    Rewards::load(state.db.clone(), Some(user.user_id.clone())).await
}

async fn rewards_response(rewards: &Rewards, created_id: Option<String>) -> RewardsResponse {
    RewardsResponse {
        rewards: rewards
            .display_order()
            .await
            .into_iter()
            .map(RewardResponse::from)
            .collect(),
        created_id,
    }
}

async fn reward_ledger_response(rewards: &Rewards, receipt: LedgerReceipt) -> RewardLedgerResponse {
    RewardLedgerResponse {
        previous_xp: receipt.previous_xp,
        xp: receipt.xp,
        rewards: rewards_response(rewards, None).await.rewards,
    }
}

/// List the caller's rewards: available newest first, then redeemed.
async fn list_rewards(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RewardsResponse>> {
    let rewards = load_rewards(&state, &user).await?;
    Ok(Json(rewards_response(&rewards, None).await))
}

async fn create_reward(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateRewardRequest>,
) -> Result<(StatusCode, Json<RewardsResponse>)> {
    body.validate()?;
    let rewards = Rewards::for_owner(state.db.clone(), Some(user.user_id.clone()));
    let id = rewards
        .add_item(&NewReward::new(&user.user_id, body.title.trim(), body.xp_cost))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(rewards_response(&rewards, Some(id)).await),
    ))
}

async fn update_reward(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRewardRequest>,
) -> Result<Json<RewardsResponse>> {
    body.validate()?;
    let patch = RewardPatch::edit(body.title.map(|t| t.trim().to_string()), body.xp_cost);
    if patch.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let rewards = load_rewards(&state, &user).await?;
    rewards.require(&id).await?;
    rewards.update_item(&id, &patch).await?;
    Ok(Json(rewards_response(&rewards, None).await))
}

async fn delete_reward(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<RewardsResponse>> {
    let rewards = load_rewards(&state, &user).await?;
    rewards.require(&id).await?;
    rewards.delete_item(&id).await?;
    Ok(Json(rewards_response(&rewards, None).await))
}

/// Redeem a reward if the balance covers its cost.
async fn redeem_reward(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<RewardLedgerResponse>> {
    let mut session = state.sessions.resume(&user).await?;
    let rewards = load_rewards(&state, &user).await?;
    let reward = rewards.require(&id).await?;

    let receipt = state
        .ledger
        .redeem_reward(&mut session, &rewards, &reward)
        .await?;
    Ok(Json(reward_ledger_response(&rewards, receipt).await))
}

/// Make a redeemed reward available again.
async fn repeat_reward(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<RewardLedgerResponse>> {
    let mut session = state.sessions.resume(&user).await?;
    let rewards = load_rewards(&state, &user).await?;
    let reward = rewards.require(&id).await?;

    let receipt = state
        .ledger
        .repeat_reward(&mut session, &rewards, &reward)
        .await?;
    Ok(Json(reward_ledger_response(&rewards, receipt).await))
}
