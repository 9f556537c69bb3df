// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local document store.
//!
//! Documents are kept as JSON objects keyed by collection and document id,
//! mirroring what the Firestore backend persists. Reads inject the document
//! id as `_firestore_id` so the same record types deserialize from both
//! backends.

use crate::error::AppError;
use crate::models::Record;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Same length as Firestore auto-ids.
const DOCUMENT_ID_BYTES: usize = 15;

type Collection = BTreeMap<String, Map<String, Value>>;

/// In-memory document store, cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<DashMap<String, Collection>>,
    /// Serializes ledger commits so read-check-write runs as one step.
    commit_lock: Arc<tokio::sync::Mutex<()>>,
    /// Artificial delay applied before every operation.
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that answers every call only after `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Read one document.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, AppError> {
        self.delay().await;
        let Some(docs) = self.collections.get(collection) else {
            return Ok(None);
        };
        docs.get(id)
            .map(|fields| decode(collection, id, fields))
            .transpose()
    }

    /// Create or overwrite a document under a caller-chosen id.
    pub async fn set<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<(), AppError> {
        self.delay().await;
        let fields = encode(value)?;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    /// Create a document under a generated id and return the id.
    pub async fn insert<T: Serialize>(&self, collection: &str, value: &T) -> Result<String, AppError> {
        self.delay().await;
        let fields = encode(value)?;
        let id = generate_document_id()?;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    /// Overwrite the fields present in `patch` on an existing document.
    pub async fn merge<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        patch: &T,
    ) -> Result<(), AppError> {
        self.delay().await;
        let fields = encode(patch)?;
        self.merge_fields(collection, id, fields)
    }

    fn merge_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        let mut docs = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection, id))?;
        let doc = docs.get_mut(id).ok_or_else(|| not_found(collection, id))?;
        doc.extend(fields);
        Ok(())
    }

    /// Delete a document. Deleting a missing document is not an error.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.delay().await;
        if let Some(mut docs) = self.collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    /// All documents whose `field` equals `value`, in id order.
    pub async fn query_eq<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, AppError> {
        self.delay().await;
        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        docs.iter()
            .filter(|(_, fields)| fields.get(field).and_then(Value::as_str) == Some(value))
            .map(|(id, fields)| decode(collection, id, fields))
            .collect()
    }

    /// Apply an item patch and a balance change as one step.
    ///
    /// The stored item must not already be in the `settled` state. `settle`
    /// receives the stored balance and returns the new one, or an error that
    /// aborts the commit before anything is written.
    #[allow(clippy::too_many_arguments)]
    pub async fn commit_ledger<T, F>(
        &self,
        collection: &str,
        item_id: &str,
        patch: &T::Patch,
        settled: bool,
        users: &str,
        user_id: &str,
        settle: F,
    ) -> Result<u64, AppError>
    where
        T: Record,
        F: FnOnce(u64) -> Result<u64, AppError>,
    {
        let _guard = self.commit_lock.lock().await;
        self.delay().await;

        let item: T = self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(item_id).map(|fields| decode(collection, item_id, fields)))
            .transpose()?
            .ok_or_else(|| not_found(collection, item_id))?;
        item.normalize().check_transition(settled)?;

        let balance = self
            .collections
            .get(users)
            .and_then(|docs| docs.get(user_id).map(|doc| doc.get("xp").and_then(Value::as_u64)))
            .ok_or_else(|| not_found(users, user_id))?
            .unwrap_or(0);

        let new_balance = settle(balance)?;

        self.merge_fields(collection, item_id, encode(patch)?)?;
        let mut xp = Map::new();
        xp.insert("xp".to_string(), Value::from(new_balance));
        self.merge_fields(users, user_id, xp)?;

        Ok(new_balance)
    }
}

fn not_found(collection: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{}/{}", collection, id))
}

fn encode<T: Serialize>(value: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(AppError::Database(format!(
            "Document must serialize to an object, got {}",
            other
        ))),
        Err(e) => Err(AppError::Database(format!("Failed to encode document: {}", e))),
    }
}

fn decode<T: DeserializeOwned>(
    collection: &str,
    id: &str,
    fields: &Map<String, Value>,
) -> Result<T, AppError> {
    let mut fields = fields.clone();
    fields.insert("_firestore_id".to_string(), Value::from(id));
    serde_json::from_value(Value::Object(fields)).map_err(|e| {
        AppError::Database(format!("Malformed document {}/{}: {}", collection, id, e))
    })
}

fn generate_document_id() -> Result<String, AppError> {
    let mut bytes = [0u8; DOCUMENT_ID_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate document id")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
