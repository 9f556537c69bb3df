// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store client with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and XP balance, keyed by identity uid)
//! - Owned records (actions and rewards, scoped by `userId`)
//! - Ledger commits (item state and balance written together)
//!
//! Every call is bounded by the configured store timeout.

use crate::db::{collections, MemoryStore, OWNER_FIELD};
use crate::error::AppError;
use crate::models::{BalancePatch, Record, User};
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreWritePrecondition};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// What a ledger commit does when the balance would drop below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overdraft {
    /// Abort with `InsufficientXp` and write nothing.
    Reject,
    /// Floor the balance at zero.
    Clamp,
}

impl Overdraft {
    /// Apply `delta` to `balance` under this policy.
    pub fn settle(self, balance: u64, delta: i64) -> Result<u64, AppError> {
        if delta >= 0 {
            return Ok(balance.saturating_add(delta.unsigned_abs()));
        }
        let cost = delta.unsigned_abs();
        match self {
            Overdraft::Reject if balance < cost => Err(AppError::InsufficientXp { balance, cost }),
            _ => Ok(balance.saturating_sub(cost)),
        }
    }
}

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(MemoryStore),
    Offline,
}

/// Only the generated id is read back after an insert.
#[derive(Deserialize)]
struct InsertedDocument {
    #[serde(rename = "_firestore_id")]
    id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
    timeout: Duration,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self::with_backend(Backend::Firestore(client)))
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self::with_backend(Backend::Firestore(client)))
    }

    /// Create a client backed by a process-local store.
    pub fn new_in_memory() -> Self {
        Self::with_backend(Backend::Memory(MemoryStore::new()))
    }

    /// Create a client over an existing in-memory store.
    pub fn from_memory(store: MemoryStore) -> Self {
        Self::with_backend(Backend::Memory(store))
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self::with_backend(Backend::Offline)
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound every store call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn offline() -> AppError {
        AppError::Database("Database not connected (offline mode)".to_string())
    }

    /// Run a store call under the configured timeout.
    async fn bounded<T, F>(&self, op: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store operation timed out"
                );
                Err(AppError::Timeout(op.to_string()))
            }
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by identity uid.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let user = self
            .bounded("get_user", async {
                match &self.backend {
                    Backend::Firestore(client) => client
                        .fluent()
                        .select()
                        .by_id_in(collections::USERS)
                        .obj::<User>()
                        .one(user_id)
                        .await
                        .map_err(|e| AppError::Database(e.to_string())),
                    Backend::Memory(store) => store.get(collections::USERS, user_id).await,
                    Backend::Offline => Err(Self::offline()),
                }
            })
            .await?;

        Ok(user.map(|mut user| {
            if user.id.is_empty() {
                user.id = user_id.to_string();
            }
            user
        }))
    }

    /// Create or overwrite a user document.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.bounded("upsert_user", async {
            match &self.backend {
                Backend::Firestore(client) => {
                    let _: () = client
                        .fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(&user.id)
                        .object(user)
                        .execute()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    Ok(())
                }
                Backend::Memory(store) => store.set(collections::USERS, &user.id, user).await,
                Backend::Offline => Err(Self::offline()),
            }
        })
        .await
    }

    /// Overwrite the stored XP balance. The user document must exist.
    pub async fn set_user_xp(&self, user_id: &str, xp: u64) -> Result<(), AppError> {
        self.update_fields(collections::USERS, user_id, &BalancePatch { xp })
            .await
    }

    // ─── Owned Record Operations ─────────────────────────────────

    /// Load every document in `collection` owned by `owner_id`.
    pub async fn query_owned<T: Record>(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Vec<T>, AppError> {
        let records: Vec<T> = self
            .bounded("query_owned", async {
                match &self.backend {
                    Backend::Firestore(client) => client
                        .fluent()
                        .select()
                        .from(collection)
                        .filter(|q| q.for_all([q.field(OWNER_FIELD).eq(owner_id)]))
                        .obj::<T>()
                        .query()
                        .await
                        .map_err(|e| {
                            AppError::Database(format!("Failed to load {}: {}", collection, e))
                        }),
                    Backend::Memory(store) => {
                        store.query_eq(collection, OWNER_FIELD, owner_id).await
                    }
                    Backend::Offline => Err(Self::offline()),
                }
            })
            .await?;

        Ok(records.into_iter().map(Record::normalize).collect())
    }

    /// Insert a record and return the store-assigned id.
    pub async fn insert<T: Record>(&self, collection: &str, new: &T::New) -> Result<String, AppError> {
        self.bounded("insert", async {
            match &self.backend {
                Backend::Firestore(client) => {
                    let inserted: InsertedDocument = client
                        .fluent()
                        .insert()
                        .into(collection)
                        .generate_document_id()
                        .object(new)
                        .execute()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    Ok(inserted.id)
                }
                Backend::Memory(store) => store.insert(collection, new).await,
                Backend::Offline => Err(Self::offline()),
            }
        })
        .await
    }

    /// Apply a partial update. Only fields present in the patch are written.
    pub async fn update<T: Record>(
        &self,
        collection: &str,
        id: &str,
        patch: &T::Patch,
    ) -> Result<(), AppError> {
        self.update_fields(collection, id, patch).await
    }

    async fn update_fields<P>(&self, collection: &str, id: &str, patch: &P) -> Result<(), AppError>
    where
        P: Serialize + DeserializeOwned + Send + Sync,
    {
        self.bounded("update", async {
            match &self.backend {
                Backend::Firestore(client) => {
                    let _: () = client
                        .fluent()
                        .update()
                        .fields(field_mask(patch)?)
                        .in_col(collection)
                        .precondition(FirestoreWritePrecondition::Exists(true))
                        .document_id(id)
                        .object(patch)
                        .execute()
                        .await
                        .map_err(|e| store_error(collection, id, e))?;
                    Ok(())
                }
                Backend::Memory(store) => store.merge(collection, id, patch).await,
                Backend::Offline => Err(Self::offline()),
            }
        })
        .await
    }

    /// Delete a document.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.bounded("delete", async {
            match &self.backend {
                Backend::Firestore(client) => client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(id)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string())),
                Backend::Memory(store) => store.delete(collection, id).await,
                Backend::Offline => Err(Self::offline()),
            }
        })
        .await
    }

    // ─── Ledger Commits ──────────────────────────────────────────

    /// Atomically apply an item patch and adjust the owner's balance by `delta`.
    ///
    /// The item and the balance are read inside the same transaction as the
    /// writes, so a concurrent commit touching either document forces a retry
    /// on the store side instead of a lost update. An item already in the
    /// `settled` state is rejected before anything is written. Returns the
    /// committed balance.
    #[allow(clippy::too_many_arguments)]
    pub async fn commit_ledger_entry<T: Record>(
        &self,
        collection: &str,
        item_id: &str,
        patch: &T::Patch,
        settled: bool,
        user_id: &str,
        delta: i64,
        overdraft: Overdraft,
    ) -> Result<u64, AppError> {
        self.bounded("commit_ledger_entry", async {
            match &self.backend {
                Backend::Firestore(client) => {
                    self.commit_in_transaction::<T>(
                        client, collection, item_id, patch, settled, user_id, delta, overdraft,
                    )
                    .await
                }
                Backend::Memory(store) => {
                    store
                        .commit_ledger::<T, _>(
                            collection,
                            item_id,
                            patch,
                            settled,
                            collections::USERS,
                            user_id,
                            |balance| overdraft.settle(balance, delta),
                        )
                        .await
                }
                Backend::Offline => Err(Self::offline()),
            }
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit_in_transaction<T: Record>(
        &self,
        client: &firestore::FirestoreDb,
        collection: &str,
        item_id: &str,
        patch: &T::Patch,
        settled: bool,
        user_id: &str,
        delta: i64,
        overdraft: Overdraft,
    ) -> Result<u64, AppError> {
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Reads through the transaction register the item and user documents
        // for conflict detection.
        let tx_client = client.clone_with_consistency_selector(
            FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
        );

        let item: Option<T> = tx_client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj::<T>()
            .one(item_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read item in transaction: {}", e))
            })?;

        let Some(item) = item else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("{}/{}", collection, item_id)));
        };

        if let Err(e) = item.normalize().check_transition(settled) {
            let _ = transaction.rollback().await;
            return Err(e);
        }

        let user: Option<User> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read balance in transaction: {}", e))
            })?;

        let Some(user) = user else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("{}/{}", collections::USERS, user_id)));
        };

        let new_balance = match overdraft.settle(user.xp, delta) {
            Ok(balance) => balance,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };

        client
            .fluent()
            .update()
            .fields(field_mask(patch)?)
            .in_col(collection)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(item_id)
            .object(patch)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add item update to transaction: {}", e))
            })?;

        // Clamped debits cannot be expressed as an increment.
        let balance_delta = new_balance as i64 - user.xp as i64;
        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .transforms(|t| t.fields([t.field("xp").increment(balance_delta)]))
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add balance update to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| store_error(collection, item_id, e))?;

        tracing::debug!(
            collection,
            item_id,
            user_id,
            delta,
            balance = new_balance,
            "Ledger entry committed"
        );

        Ok(new_balance)
    }
}

/// Top-level field names the patch serializes, used as the update mask.
fn field_mask<P: Serialize>(patch: &P) -> Result<Vec<String>, AppError> {
    match serde_json::to_value(patch) {
        Ok(serde_json::Value::Object(fields)) => Ok(fields.keys().cloned().collect()),
        Ok(_) => Err(AppError::Database("Patch must serialize to an object".to_string())),
        Err(e) => Err(AppError::Database(format!("Failed to encode patch: {}", e))),
    }
}

fn store_error(collection: &str, id: &str, err: FirestoreError) -> AppError {
    match err {
        FirestoreError::DataNotFoundError(_) => {
            AppError::NotFound(format!("{}/{}", collection, id))
        }
        other => AppError::Database(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionPatch;

    #[test]
    fn test_field_mask_lists_only_patched_fields() {
        let mut mask = field_mask(&ActionPatch::reopen()).unwrap();
        mask.sort();
        assert_eq!(mask, ["completed", "completedAt"]);
    }

    #[test]
    fn test_overdraft_settlement() {
        assert_eq!(Overdraft::Reject.settle(5, 10).unwrap(), 15);
        assert_eq!(Overdraft::Reject.settle(20, -15).unwrap(), 5);
        assert!(matches!(
            Overdraft::Reject.settle(5, -15),
            Err(AppError::InsufficientXp {
                balance: 5,
                cost: 15
            })
        ));
        assert_eq!(Overdraft::Clamp.settle(5, -15).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_mode_reports_database_error() {
        let db = FirestoreDb::new_mock();
        let err = db.get_user("u1").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let db = FirestoreDb::from_memory(MemoryStore::with_latency(Duration::from_millis(200)))
            .with_timeout(Duration::from_millis(20));
        let err = db.get_user("u1").await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(ref op) if op == "get_user"));
    }
}
