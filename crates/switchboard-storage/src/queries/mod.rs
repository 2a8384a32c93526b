// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes a [`Database`](crate::Database)
//! and runs its statements inside a single connection call.

pub mod activity;
pub mod conversations;
pub mod crm;
pub mod digest;
pub mod followups;
pub mod guard;
pub mod messages;
pub mod tenants;
