// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, with an in-process fallback).

pub mod firestore;
pub mod memory;

pub use firestore::{FirestoreDb, Overdraft};
pub use memory::MemoryStore;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ACTIONS: &str = "actions";
    pub const REWARDS: &str = "rewards";
}

/// Field that scopes every owned document to one user.
pub const OWNER_FIELD: &str = "userId";
