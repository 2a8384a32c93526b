// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for AI completion services.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for an AI completion API, used by the fallback chain and by
/// background analysis jobs.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Model used when the request does not override it.
    fn default_model(&self) -> &str;

    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest)
    -> Result<ProviderResponse, SwitchboardError>;
}
