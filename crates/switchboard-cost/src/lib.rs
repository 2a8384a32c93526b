// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage accounting for every AI call the engine makes.
//!
//! This crate provides:
//! - **Usage ledger**: per-call records plus daily/model and all-time aggregates
//! - **Pricing**: per-model USD cost from token counts

pub mod ledger;
pub mod pricing;

pub use ledger::{CallSite, UsageLedger};
pub use pricing::{ModelPricing, calculate_cost, get_pricing};
