// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite shared store for Switchboard.
//!
//! One WAL-mode database file holds every tenant's conversations, message
//! logs, guard keys, CRM profiles, activity log, and digest cache. Statements
//! run on the `tokio-rusqlite` background thread; cross-instance correctness
//! rests on single-statement upserts and compare-and-set writes rather than
//! in-process locks.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;
pub mod rows;
pub mod store;

pub use adapter::SqliteStore;
pub use database::{Database, map_tr_err};
pub use queries::activity::ActivityFilter;
pub use queries::conversations::ConversationFilter;
pub use queries::guard::{Idempotency, RateDecision};
pub use store::ConversationStore;
