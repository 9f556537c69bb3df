// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Binding between a typed record and the collection it lives in.

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A document type owned by a single user.
///
/// The record itself is read-only: it is produced by deserializing a stored
/// document (with the store-assigned id injected as `_firestore_id`). Writes
/// go through [`Record::New`] for inserts and [`Record::Patch`] for partial
/// updates, so a record is never written back wholesale.
pub trait Record: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Default collection name.
    const COLLECTION: &'static str;

    /// Insert shape: every field except the store-assigned id.
    type New: Serialize + DeserializeOwned + Send + Sync;

    /// Partial update. Only fields that serialize end up in the update mask.
    type Patch: Serialize + DeserializeOwned + Send + Sync;

    /// Singular name used in messages, e.g. `Action`.
    const KIND: &'static str;

    /// Name of the ledger state, e.g. `completed`.
    const SETTLED: &'static str;

    fn id(&self) -> &str;

    fn owner_id(&self) -> &str;

    /// Whether the ledger has settled this item (completed or redeemed).
    fn is_settled(&self) -> bool;

    /// Reject a ledger transition into a state the item is already in.
    fn check_transition(&self, settled: bool) -> Result<(), AppError> {
        if self.is_settled() == settled {
            let negation = if settled { "already" } else { "not" };
            return Err(AppError::BadRequest(format!(
                "{} {} is {} {}",
                Self::KIND,
                self.id(),
                negation,
                Self::SETTLED
            )));
        }
        Ok(())
    }

    /// Reconcile a freshly loaded document with the record's invariants.
    fn normalize(self) -> Self {
        self
    }
}
