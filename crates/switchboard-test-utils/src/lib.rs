// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Fallback provider with scripted replies, failures and empties
//! - [`MockChannel`] - Channel adapter capturing sends, with scripted failures
//! - [`ScriptedResolver`] - Pipeline resolver returning queued outputs
//! - [`TestHarness`] - Temp store plus an orchestrator wired with the mocks

pub mod harness;
pub mod mock_channel;
pub mod mock_provider;
pub mod scripted_resolver;

pub use harness::TestHarness;
pub use mock_channel::MockChannel;
pub use mock_provider::MockProvider;
pub use scripted_resolver::ScriptedResolver;
