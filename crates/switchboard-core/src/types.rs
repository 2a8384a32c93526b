// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter-facing types shared across the workspace: the channel-normalized
//! inbound event, outbound messages, and provider request/response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Provider,
    Storage,
    Resolver,
}

/// External messaging channel an event arrived on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelKind {
    Line,
    Messenger,
}

/// Kind of inbound channel event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Text,
    Image,
    Postback,
    Follow,
}

/// A channel-agnostic inbound event produced by a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub tenant_id: String,
    pub channel: ChannelKind,
    pub external_user_id: String,
    pub kind: EventKind,
    pub text: Option<String>,
    pub attachment_url: Option<String>,
    /// Channel delivery token; doubles as the idempotency key.
    pub delivery_token: String,
    /// Short-lived token for answering this event, when the channel has one.
    #[serde(default)]
    pub reply_token: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Key used for duplicate suppression.
    ///
    /// Prefixed with the channel so tokens from different platforms can
    /// never collide.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}:{}", self.channel, self.tenant_id, self.delivery_token)
    }

    /// Text the resolver should see; postbacks carry their payload as text.
    pub fn question(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Unique identifier for a message accepted by a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// An outbound message to deliver through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient_id: String,
    pub text: Option<String>,
    pub media_url: Option<String>,
    /// Short-lived reply token when answering an inbound event.
    pub reply_token: Option<String>,
}

impl OutboundMessage {
    /// Text reply to an inbound event.
    pub fn reply(recipient_id: impl Into<String>, text: impl Into<String>, reply_token: Option<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            text: Some(text.into()),
            media_url: None,
            reply_token,
        }
    }

    /// Unsolicited push message with no reply token.
    pub fn push(recipient_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::reply(recipient_id, text, None)
    }
}

/// Public profile of a channel user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

/// A single turn handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl ProviderMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// A completion request for a fallback-chain or analysis provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Model override; providers use their configured model when `None`.
    pub model: Option<String>,
    pub system_prompt: String,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A successful provider completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn event(token: &str) -> InboundEvent {
        InboundEvent {
            tenant_id: "shop".into(),
            channel: ChannelKind::Line,
            external_user_id: "U1".into(),
            kind: EventKind::Text,
            text: Some("  hello  ".into()),
            attachment_url: None,
            delivery_token: token.into(),
            reply_token: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn idempotency_key_is_channel_scoped() {
        let key = event("tok-1").idempotency_key();
        assert_eq!(key, "line:shop:tok-1");
    }

    #[test]
    fn question_is_trimmed_and_empty_is_none() {
        let mut e = event("t");
        assert_eq!(e.question(), Some("hello"));
        e.text = Some("   ".into());
        assert_eq!(e.question(), None);
    }

    #[test]
    fn channel_kind_parses_lowercase() {
        assert_eq!(ChannelKind::from_str("messenger").unwrap(), ChannelKind::Messenger);
        assert_eq!(ChannelKind::Line.to_string(), "line");
        let json = serde_json::to_string(&EventKind::Postback).unwrap();
        assert_eq!(json, "\"postback\"");
    }
}
