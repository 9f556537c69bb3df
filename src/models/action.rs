// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Actions: things a user does to earn XP.

use super::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An action document as loaded from the `actions` collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Store-assigned document id
    #[serde(rename = "_firestore_id", default)]
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// XP earned on completion
    pub xp: u32,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Record for Action {
    const COLLECTION: &'static str = crate::db::collections::ACTIONS;
    type New = NewAction;
    type Patch = ActionPatch;
    const KIND: &'static str = "Action";
    const SETTLED: &'static str = "completed";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.user_id
    }

    fn is_settled(&self) -> bool {
        self.completed
    }

    /// The flag wins when it disagrees with the completion time. A completed
    /// action without a time is treated as completed when it was created.
    fn normalize(mut self) -> Self {
        if self.completed != self.completed_at.is_some() {
            tracing::warn!(
                action_id = %self.id,
                completed = self.completed,
                "Action flag and completion time disagree; trusting the flag"
            );
            self.completed_at = self.completed.then_some(self.created_at);
        }
        self
    }
}

/// Insert shape for a new, not yet completed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAction {
    pub user_id: String,
    pub title: String,
    pub xp: u32,
    pub completed: bool,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_null_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl NewAction {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, xp: u32) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            xp,
            completed: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Partial update of an action. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::time_utils::patch_timestamp::serialize"
    )]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl ActionPatch {
    /// Mark completed at `at`.
    pub fn complete(at: DateTime<Utc>) -> Self {
        Self {
            completed: Some(true),
            completed_at: Some(Some(at)),
            ..Self::default()
        }
    }

    /// Return to the not-completed state.
    pub fn reopen() -> Self {
        Self {
            completed: Some(false),
            completed_at: Some(None),
            ..Self::default()
        }
    }

    /// Change title and/or XP value without touching completion state.
    pub fn edit(title: Option<String>, xp: Option<u32>) -> Self {
        Self {
            title,
            xp,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.xp.is_none()
            && self.completed.is_none()
            && self.completed_at.is_none()
    }
}

/// Display order: incomplete actions first, otherwise load order.
pub fn sort_for_display(actions: &mut [Action]) {
    actions.sort_by_key(|a| a.completed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use serde_json::json;

    fn action(id: &str, completed: bool) -> Action {
        Action {
            id: id.to_string(),
            user_id: "u1".to_string(),
            title: id.to_string(),
            xp: 5,
            completed,
            created_at: Utc::now(),
            completed_at: completed.then(Utc::now),
        }
    }

    #[test]
    fn test_complete_patch_sets_flag_and_timestamp_together() {
        let value = serde_json::to_value(ActionPatch::complete(Utc::now())).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["completed"], true);
        assert!(obj["completedAt"].is_string());
    }

    #[test]
    fn test_reopen_patch_writes_explicit_null() {
        let value = serde_json::to_value(ActionPatch::reopen()).unwrap();
        assert_eq!(value, json!({ "completed": false, "completedAt": null }));
    }

    #[test]
    fn test_edit_patch_only_carries_edited_fields() {
        let patch = ActionPatch::edit(Some("Run".to_string()), None);
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "title": "Run" }));
        assert!(ActionPatch::edit(None, None).is_empty());
    }

    #[test]
    fn test_legacy_document_without_completed_at() {
        let loaded: Action = serde_json::from_value(json!({
            "_firestore_id": "a1",
            "userId": "u1",
            "title": "Walk",
            "xp": 10,
            "completed": false,
            "createdAt": "2025-01-01T00:00:00Z",
            "someOtherField": 3
        }))
        .unwrap();
        assert_eq!(loaded.id, "a1");
        assert_eq!(loaded.completed_at, None);
    }

    #[test]
    fn test_completed_without_time_uses_creation_time() {
        let loaded: Action = serde_json::from_value(json!({
            "_firestore_id": "a1",
            "userId": "u1",
            "title": "Walk",
            "xp": 10,
            "completed": true,
            "createdAt": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        let normalized = loaded.normalize();
        assert!(normalized.completed);
        assert_eq!(normalized.completed_at, Some(normalized.created_at));
    }

    #[test]
    fn test_stray_completion_time_is_cleared() {
        let mut stray = action("a1", false);
        stray.completed_at = Some(Utc::now());
        assert_eq!(stray.normalize().completed_at, None);
    }

    #[test]
    fn test_transition_into_current_state_rejected() {
        let done = action("a1", true);
        let err = done.check_transition(true).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Action a1 is already completed"));
        assert!(done.check_transition(false).is_ok());

        let err = action("a2", false).check_transition(false).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "Action a2 is not completed"));
    }

    #[test]
    fn test_missing_required_field_rejects_document() {
        let result = serde_json::from_value::<Action>(json!({
            "userId": "u1",
            "xp": 10,
            "createdAt": "2025-01-01T00:00:00Z"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_incomplete_actions_sort_first_and_stay_stable() {
        let mut actions = vec![
            action("done-1", true),
            action("todo-1", false),
            action("done-2", true),
            action("todo-2", false),
        ];
        sort_for_display(&mut actions);
        let ids: Vec<&str> = actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["todo-1", "todo-2", "done-1", "done-2"]);
    }
}
