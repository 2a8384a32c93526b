// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Learning feedback loop for Switchboard.
//!
//! Admin corrections are classified by an analysis model into intents,
//! knowledge documents, or scripts; accepted entries are stored enabled and
//! handed to the resolver on later turns. Unanswered questions are counted
//! in the miss tracker and every bot reply is kept in a bounded Q&A review
//! log. Everything here is TTL-bound.

pub mod analyzer;
pub mod misses;
pub mod qa;
pub mod store;

pub use analyzer::{Analysis, CorrectionAnalyzer, LearnAction, LearnOutcome};
pub use misses::MissTracker;
pub use qa::QaLog;
pub use store::LearnedStore;
