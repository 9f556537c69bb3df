// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rewards: things a user buys with XP.

use super::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// A reward document as loaded from the `rewards` collection.
///
/// Documents written before the `redeemed` flag existed only carry
/// `redeemedAt`; [`Record::normalize`] derives the flag for them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    /// Store-assigned document id
    #[serde(rename = "_firestore_id", default)]
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// XP spent on redemption
    pub xp_cost: u32,
    #[serde(default)]
    pub redeemed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Record for Reward {
    const COLLECTION: &'static str = crate::db::collections::REWARDS;
    type New = NewReward;
    type Patch = RewardPatch;

    const KIND: &'static str = "Reward";
    const SETTLED: &'static str = "redeemed";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.user_id
    }

    fn is_settled(&self) -> bool {
        self.redeemed
    }

    /// A redemption time implies the flag. A redeemed reward without a time
    /// is treated as redeemed when it was created.
    fn normalize(mut self) -> Self {
        if self.redeemed_at.is_some() && !self.redeemed {
            self.redeemed = true;
        } else if self.redeemed && self.redeemed_at.is_none() {
            tracing::warn!(
                reward_id = %self.id,
                "Reward marked redeemed without a redemption time"
            );
            self.redeemed_at = Some(self.created_at);
        }
        self
    }
}

/// Insert shape for a new, unredeemed reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReward {
    pub user_id: String,
    pub title: String,
    pub xp_cost: u32,
    pub redeemed: bool,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_null_timestamp")]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl NewReward {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, xp_cost: u32) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            xp_cost,
            redeemed: false,
            created_at: Utc::now(),
            redeemed_at: None,
        }
    }
}

/// Partial update of a reward. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp_cost: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::time_utils::patch_timestamp::serialize"
    )]
    pub redeemed_at: Option<Option<DateTime<Utc>>>,
}

impl RewardPatch {
    /// Mark redeemed at `at`.
    pub fn redeem(at: DateTime<Utc>) -> Self {
        Self {
            redeemed: Some(true),
            redeemed_at: Some(Some(at)),
            ..Self::default()
        }
    }

    /// Make the reward available again.
    pub fn reopen() -> Self {
        Self {
            redeemed: Some(false),
            redeemed_at: Some(None),
            ..Self::default()
        }
    }

    /// Change title and/or cost without touching redemption state.
    pub fn edit(title: Option<String>, xp_cost: Option<u32>) -> Self {
        Self {
            title,
            xp_cost,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.xp_cost.is_none()
            && self.redeemed.is_none()
            && self.redeemed_at.is_none()
    }
}

/// Display order: available rewards newest first, then redeemed rewards
/// most recently redeemed first.
pub fn sort_for_display(rewards: &mut [Reward]) {
    rewards.sort_by_key(|r| {
        (
            r.redeemed,
            Reverse(if r.redeemed {
                r.redeemed_at
            } else {
                Some(r.created_at)
            }),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap()
    }

    fn reward(id: &str, created: u32, redeemed: Option<u32>) -> Reward {
        Reward {
            id: id.to_string(),
            user_id: "u1".to_string(),
            title: id.to_string(),
            xp_cost: 10,
            redeemed: redeemed.is_some(),
            created_at: at(created),
            redeemed_at: redeemed.map(at),
        }
    }

    #[test]
    fn test_legacy_reward_derives_flag_from_timestamp() {
        let loaded: Reward = serde_json::from_value(json!({
            "_firestore_id": "r1",
            "userId": "u1",
            "title": "Movie night",
            "xpCost": 15,
            "createdAt": "2025-01-01T00:00:00Z",
            "redeemedAt": "2025-01-02T00:00:00Z"
        }))
        .unwrap();
        assert!(!loaded.redeemed);

        let normalized = loaded.normalize();
        assert!(normalized.redeemed);
    }

    #[test]
    fn test_redeemed_without_time_uses_creation_time() {
        let mut legacy = reward("r1", 4, None);
        legacy.redeemed = true;

        let normalized = legacy.normalize();
        assert_eq!(normalized.redeemed_at, Some(at(4)));
        assert!(normalized.check_transition(true).is_err());
    }

    #[test]
    fn test_redeem_and_reopen_patches() {
        let redeem = serde_json::to_value(RewardPatch::redeem(at(3))).unwrap();
        assert_eq!(redeem["redeemed"], true);
        assert!(redeem["redeemedAt"].is_string());

        let reopen = serde_json::to_value(RewardPatch::reopen()).unwrap();
        assert_eq!(reopen, json!({ "redeemed": false, "redeemedAt": null }));
    }

    #[test]
    fn test_new_reward_writes_null_redemption_time() {
        let value = serde_json::to_value(NewReward::new("u1", "Cake", 20)).unwrap();
        assert_eq!(value["redeemedAt"], serde_json::Value::Null);
        assert_eq!(value["xpCost"], 20);
    }

    #[test]
    fn test_display_order() {
        let mut rewards = vec![
            reward("old-redeemed", 1, Some(4)),
            reward("old-open", 1, None),
            reward("new-redeemed", 2, Some(9)),
            reward("new-open", 5, None),
        ];
        sort_for_display(&mut rewards);
        let ids: Vec<&str> = rewards.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["new-open", "old-open", "new-redeemed", "old-redeemed"]);
    }
}
