// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Switchboard.
//!
//! Serves the LINE and Messenger webhooks, which verify the channel
//! signature and hand each event to the orchestrator, and the bearer-token
//! protected review API consumed by the admin dashboard.

pub mod auth;
pub mod error;
pub mod review;
pub mod server;
pub mod webhooks;

pub use server::{GatewayState, ServerConfig, router, start_server};
