// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LINE channel adapter for Switchboard.
//!
//! Verifies `x-line-signature`, normalizes webhook events, fetches user
//! profiles, and sends replies. A reply token is tried first; when it is
//! missing, expired, or already used, the message is pushed instead.

pub mod client;
pub mod signature;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use switchboard_config::model::LineConfig;
use switchboard_core::{
    AdapterType, ChannelAdapter, ChannelKind, HealthStatus, InboundEvent, MessageId,
    OutboundMessage, PluginAdapter, SwitchboardError, UserProfile,
};
use tracing::{debug, warn};

use crate::client::{DATA_API_BASE, LineClient, LineMessage};

/// Delay before the single profile-fetch retry.
const PROFILE_RETRY_DELAY: Duration = Duration::from_millis(300);

pub struct LineChannel {
    channel_secret: String,
    client: LineClient,
    data_base: String,
}

impl LineChannel {
    pub fn new(config: &LineConfig, timeout: Duration) -> Result<Self, SwitchboardError> {
        if config.channel_secret.is_empty() || config.access_token.is_empty() {
            return Err(SwitchboardError::Config(
                "LINE channel_secret and access_token are required".into(),
            ));
        }
        let client = LineClient::new(&config.access_token, config.api_base.clone(), timeout)?;
        Ok(Self {
            channel_secret: config.channel_secret.clone(),
            client,
            data_base: config.api_base.clone().unwrap_or_else(|| DATA_API_BASE.to_string()),
        })
    }

    fn messages(msg: &OutboundMessage) -> Result<Vec<LineMessage>, SwitchboardError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(text) = msg.text.as_deref().filter(|t| !t.is_empty()) {
            messages.push(LineMessage::Text {
                text: text.to_string(),
            });
        }
        if let Some(url) = &msg.media_url {
            messages.push(LineMessage::Image {
                original_content_url: url.clone(),
                preview_image_url: url.clone(),
            });
        }
        if messages.is_empty() {
            return Err(SwitchboardError::InvalidInput("outbound message is empty".into()));
        }
        Ok(messages)
    }
}

#[async_trait]
impl PluginAdapter for LineChannel {
    fn name(&self) -> &str {
        "line"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for LineChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Line
    }

    fn verify_signature(&self, body: &[u8], signature: &str) -> Result<(), SwitchboardError> {
        signature::verify(&self.channel_secret, body, signature)
    }

    fn parse_events(&self, tenant_id: &str, body: &[u8]) -> Result<Vec<InboundEvent>, SwitchboardError> {
        webhook::parse(tenant_id, body, &self.data_base)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, SwitchboardError> {
        match self.client.profile(user_id).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                warn!(user_id, error = %e, "LINE profile fetch failed, retrying once");
                tokio::time::sleep(PROFILE_RETRY_DELAY).await;
                self.client.profile(user_id).await
            }
        }
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, SwitchboardError> {
        let messages = Self::messages(&msg)?;
        if let Some(token) = &msg.reply_token {
            match self.client.reply(token, &messages).await {
                Ok(id) => return Ok(MessageId(id)),
                Err(e) => {
                    debug!(recipient = %msg.recipient_id, error = %e, "reply token rejected, pushing instead");
                }
            }
        }
        self.client
            .push(&msg.recipient_id, &messages)
            .await
            .map(MessageId)
    }
}
