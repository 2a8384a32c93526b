// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the shared store backend.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle of the shared store backend.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (open, migrations).
    async fn initialize(&self) -> Result<(), SwitchboardError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), SwitchboardError>;
}
