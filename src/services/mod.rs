// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod collection;
pub mod identity;
pub mod ledger;
pub mod session;
pub mod suggest;

pub use collection::{Actions, CollectionSync, Rewards};
pub use identity::{IdentityClient, IdentityUser};
pub use ledger::{BalanceWrites, LedgerPolicy, LedgerReceipt, PointsLedger, RepeatPolicy};
pub use session::{Session, SessionProvider};
pub use suggest::XpSuggester;
