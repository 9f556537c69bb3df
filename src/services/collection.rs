// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Owner-scoped view of one collection.
//!
//! [`CollectionSync`] keeps the last loaded list of an owner's documents and
//! reloads it in full after every mutation, so callers always observe what
//! the store holds rather than a locally patched copy. Overlapping calls are
//! not serialized: the list reflects whichever reload finished last.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{action, reward, Action, Record, Reward};
use tokio::sync::RwLock;

#[derive(Debug)]
struct SyncState<T> {
    items: Vec<T>,
    loading: bool,
}

/// Local mirror of the documents in `collection` owned by `owner_id`.
pub struct CollectionSync<T: Record> {
    db: FirestoreDb,
    collection: String,
    owner_id: Option<String>,
    state: RwLock<SyncState<T>>,
}

/// The signed-in user's actions.
pub type Actions = CollectionSync<Action>;

/// The signed-in user's rewards.
pub type Rewards = CollectionSync<Reward>;

impl<T: Record> CollectionSync<T> {
    /// Bind to `collection`. Without an owner the view stays empty and never
    /// touches the store.
    pub fn new(db: FirestoreDb, collection: impl Into<String>, owner_id: Option<String>) -> Self {
        let loading = owner_id.is_some();
        Self {
            db,
            collection: collection.into(),
            owner_id,
            state: RwLock::new(SyncState {
                items: Vec::new(),
                loading,
            }),
        }
    }

    /// Bind to the record type's default collection.
    pub fn for_owner(db: FirestoreDb, owner_id: Option<String>) -> Self {
        Self::new(db, T::COLLECTION, owner_id)
    }

    /// Create a view and perform the initial load.
    pub async fn load(
        db: FirestoreDb,
        owner_id: Option<String>,
    ) -> Result<Self, AppError> {
        let sync = Self::for_owner(db, owner_id);
        sync.fetch_items().await?;
        Ok(sync)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Snapshot of the last loaded list.
    pub async fn items(&self) -> Vec<T> {
        self.state.read().await.items.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Look up an item in the last loaded list.
    pub async fn find(&self, id: &str) -> Option<T> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Like [`find`](Self::find), but a missing item is an error.
    pub async fn require(&self, id: &str) -> Result<T, AppError> {
        self.find(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", self.collection, id)))
    }

    /// Replace the local list with the owner's documents from the store.
    pub async fn fetch_items(&self) -> Result<(), AppError> {
        let Some(owner_id) = self.owner_id.as_deref() else {
            let mut state = self.state.write().await;
            state.items.clear();
            state.loading = false;
            return Ok(());
        };

        self.state.write().await.loading = true;
        let result = self.db.query_owned::<T>(&self.collection, owner_id).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(items) => {
                tracing::debug!(
                    collection = %self.collection,
                    owner_id,
                    count = items.len(),
                    "Collection loaded"
                );
                state.items = items;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    collection = %self.collection,
                    owner_id,
                    error = %e,
                    "Failed to load collection"
                );
                Err(e)
            }
        }
    }

    /// Insert a document, reload, and return the store-assigned id.
    pub async fn add_item(&self, new: &T::New) -> Result<String, AppError> {
        let id = self.db.insert::<T>(&self.collection, new).await?;
        tracing::info!(collection = %self.collection, id = %id, "Item added");
        self.fetch_items().await?;
        Ok(id)
    }

    /// Apply a partial update to an existing document, then reload.
    pub async fn update_item(&self, id: &str, patch: &T::Patch) -> Result<(), AppError> {
        self.db.update::<T>(&self.collection, id, patch).await?;
        tracing::debug!(collection = %self.collection, id, "Item updated");
        self.fetch_items().await
    }

    /// Delete a document, then reload.
    pub async fn delete_item(&self, id: &str) -> Result<(), AppError> {
        self.db.delete(&self.collection, id).await?;
        tracing::info!(collection = %self.collection, id, "Item deleted");
        self.fetch_items().await
    }
}

impl CollectionSync<Action> {
    /// Actions in display order: incomplete first.
    pub async fn display_order(&self) -> Vec<Action> {
        let mut items = self.items().await;
        action::sort_for_display(&mut items);
        items
    }
}

impl CollectionSync<Reward> {
    /// Rewards in display order: available newest first, then redeemed.
    pub async fn display_order(&self) -> Vec<Reward> {
        let mut items = self.items().await;
        reward::sort_for_display(&mut items);
        items
    }
}
