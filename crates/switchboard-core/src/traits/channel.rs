// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for external messaging platforms (LINE, Messenger).

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelKind, InboundEvent, MessageId, OutboundMessage, UserProfile};

/// Adapter for one tenant's account on an external messaging channel.
///
/// Webhooks are pushed to the gateway, so there is no receive loop: the
/// gateway hands raw bodies to [`verify_signature`](Self::verify_signature)
/// and [`parse_events`](Self::parse_events), and the orchestrator answers
/// through [`send`](Self::send).
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Which platform this adapter talks to.
    fn kind(&self) -> ChannelKind;

    /// Verifies the webhook signature header against the raw body.
    fn verify_signature(&self, body: &[u8], signature: &str) -> Result<(), SwitchboardError>;

    /// Normalizes a verified webhook body into inbound events.
    ///
    /// Unsupported event types are skipped rather than rejected.
    fn parse_events(
        &self,
        tenant_id: &str,
        body: &[u8],
    ) -> Result<Vec<InboundEvent>, SwitchboardError>;

    /// Fetches the user's public profile. Retries once on failure.
    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, SwitchboardError>;

    /// Delivers a message. Returns only after the platform accepted it.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, SwitchboardError>;
}
