// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP ledger: completing actions earns XP, redeeming rewards spends it.
//!
//! Each operation writes the item's new state and the user's new balance,
//! then updates the session and reloads the item list. How the two writes
//! relate is governed by [`BalanceWrites`]:
//!
//! - `Sequential` overwrites the stored balance with a value computed from
//!   the session snapshot, in a second independent write. Two completions
//!   racing from the same snapshot lose one of the increments.
//! - `Atomic` commits the item write and a balance increment in a single
//!   store transaction. The stored item state and balance are checked
//!   inside it, so a repeated request cannot settle the same item twice.

use crate::db::{FirestoreDb, Overdraft};
use crate::error::AppError;
use crate::models::{Action, ActionPatch, Record, Reward, RewardPatch};
use crate::services::collection::CollectionSync;
use crate::services::session::Session;
use chrono::Utc;
use std::str::FromStr;

/// XP effect of putting a completed action or redeemed reward back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatPolicy {
    /// Balance untouched. Completing again earns the XP a second time.
    #[default]
    KeepXp,
    /// Take back the earned XP (floored at zero) or refund the cost.
    RevertXp,
}

impl FromStr for RepeatPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep_xp" => Ok(RepeatPolicy::KeepXp),
            "revert_xp" => Ok(RepeatPolicy::RevertXp),
            other => Err(format!("unknown repeat policy '{}'", other)),
        }
    }
}

/// How the item write and the balance write are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceWrites {
    /// Item write, then an overwrite of the balance.
    #[default]
    Sequential,
    /// One transaction with an increment of the balance.
    Atomic,
}

impl FromStr for BalanceWrites {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(BalanceWrites::Sequential),
            "atomic" => Ok(BalanceWrites::Atomic),
            other => Err(format!("unknown balance write mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LedgerPolicy {
    pub repeat: RepeatPolicy,
    pub balance_writes: BalanceWrites,
}

/// Balance before and after a ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub previous_xp: u64,
    pub xp: u64,
}

/// One item transition and its effect on the balance.
struct Entry<'a, T: Record> {
    item_id: &'a str,
    patch: T::Patch,
    /// Ledger state the patch moves the item into.
    settled: bool,
    delta: i64,
    overdraft: Overdraft,
}

#[derive(Clone)]
pub struct PointsLedger {
    db: FirestoreDb,
    policy: LedgerPolicy,
}

impl PointsLedger {
    pub fn new(db: FirestoreDb, policy: LedgerPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Mark an action completed and credit its XP.
    pub async fn complete_action(
        &self,
        session: &mut Session,
        actions: &CollectionSync<Action>,
        action: &Action,
    ) -> Result<LedgerReceipt, AppError> {
        check_owner(session, action)?;
        action.check_transition(true)?;

        let receipt = self
            .apply(
                session,
                actions,
                Entry::<Action> {
                    item_id: &action.id,
                    patch: ActionPatch::complete(Utc::now()),
                    settled: true,
                    delta: i64::from(action.xp),
                    overdraft: Overdraft::Reject,
                },
            )
            .await?;

        tracing::info!(
            user_id = %session.user_id(),
            action_id = %action.id,
            earned = action.xp,
            xp = receipt.xp,
            "Action completed"
        );
        Ok(receipt)
    }

    /// Put a completed action back on the list.
    pub async fn repeat_action(
        &self,
        session: &mut Session,
        actions: &CollectionSync<Action>,
        action: &Action,
    ) -> Result<LedgerReceipt, AppError> {
        check_owner(session, action)?;
        action.check_transition(false)?;

        let delta = match self.policy.repeat {
            RepeatPolicy::KeepXp => 0,
            RepeatPolicy::RevertXp => -i64::from(action.xp),
        };

        let receipt = self
            .apply(
                session,
                actions,
                Entry::<Action> {
                    item_id: &action.id,
                    patch: ActionPatch::reopen(),
                    settled: false,
                    delta,
                    overdraft: Overdraft::Clamp,
                },
            )
            .await?;

        tracing::info!(
            user_id = %session.user_id(),
            action_id = %action.id,
            xp = receipt.xp,
            "Action repeated"
        );
        Ok(receipt)
    }

    /// Mark a reward redeemed and debit its cost.
    pub async fn redeem_reward(
        &self,
        session: &mut Session,
        rewards: &CollectionSync<Reward>,
        reward: &Reward,
    ) -> Result<LedgerReceipt, AppError> {
        check_owner(session, reward)?;
        reward.check_transition(true)?;

        let cost = u64::from(reward.xp_cost);
        if session.xp() < cost {
            return Err(AppError::InsufficientXp {
                balance: session.xp(),
                cost,
            });
        }

        let receipt = self
            .apply(
                session,
                rewards,
                Entry::<Reward> {
                    item_id: &reward.id,
                    patch: RewardPatch::redeem(Utc::now()),
                    settled: true,
                    delta: -i64::from(reward.xp_cost),
                    overdraft: Overdraft::Reject,
                },
            )
            .await?;

        tracing::info!(
            user_id = %session.user_id(),
            reward_id = %reward.id,
            cost,
            xp = receipt.xp,
            "Reward redeemed"
        );
        Ok(receipt)
    }

    /// Make a redeemed reward available again.
    pub async fn repeat_reward(
        &self,
        session: &mut Session,
        rewards: &CollectionSync<Reward>,
        reward: &Reward,
    ) -> Result<LedgerReceipt, AppError> {
        check_owner(session, reward)?;
        reward.check_transition(false)?;

        let delta = match self.policy.repeat {
            RepeatPolicy::KeepXp => 0,
            RepeatPolicy::RevertXp => i64::from(reward.xp_cost),
        };

        let receipt = self
            .apply(
                session,
                rewards,
                Entry::<Reward> {
                    item_id: &reward.id,
                    patch: RewardPatch::reopen(),
                    settled: false,
                    delta,
                    overdraft: Overdraft::Clamp,
                },
            )
            .await?;

        tracing::info!(
            user_id = %session.user_id(),
            reward_id = %reward.id,
            xp = receipt.xp,
            "Reward repeated"
        );
        Ok(receipt)
    }

    async fn apply<T: Record>(
        &self,
        session: &mut Session,
        items: &CollectionSync<T>,
        entry: Entry<'_, T>,
    ) -> Result<LedgerReceipt, AppError> {
        let previous_xp = session.xp();
        let collection = items.collection();

        let xp = if entry.delta == 0 {
            self.db
                .update::<T>(collection, entry.item_id, &entry.patch)
                .await?;
            previous_xp
        } else {
            match self.policy.balance_writes {
                BalanceWrites::Sequential => {
                    let new_xp = entry.overdraft.settle(previous_xp, entry.delta)?;
                    self.db
                        .update::<T>(collection, entry.item_id, &entry.patch)
                        .await?;

                    if let Err(e) = self.db.set_user_xp(session.user_id(), new_xp).await {
                        tracing::error!(
                            user_id = %session.user_id(),
                            collection,
                            item_id = entry.item_id,
                            expected_xp = new_xp,
                            error = %e,
                            "Item written but balance write failed"
                        );
                        return Err(AppError::LedgerDivergence {
                            item_id: entry.item_id.to_string(),
                            expected_xp: new_xp,
                        });
                    }
                    new_xp
                }
                BalanceWrites::Atomic => {
                    self.db
                        .commit_ledger_entry::<T>(
                            collection,
                            entry.item_id,
                            &entry.patch,
                            entry.settled,
                            session.user_id(),
                            entry.delta,
                            entry.overdraft,
                        )
                        .await?
                }
            }
        };

        session.set_xp(xp);
        items.fetch_items().await?;

        Ok(LedgerReceipt { previous_xp, xp })
    }
}

/// Items outside the caller's own collection are reported as missing.
fn check_owner<T: Record>(session: &Session, item: &T) -> Result<(), AppError> {
    if item.owner_id() != session.user_id() {
        tracing::warn!(
            user_id = %session.user_id(),
            item_id = item.id(),
            "Ledger operation on another user's item"
        );
        return Err(AppError::NotFound(format!("{}/{}", T::COLLECTION, item.id())));
    }
    Ok(())
}
