// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod action;
pub mod record;
pub mod reward;
pub mod user;

pub use action::{Action, ActionPatch, NewAction};
pub use record::Record;
pub use reward::{NewReward, Reward, RewardPatch};
pub use user::{BalancePatch, User};
