// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LINE webhook payload and its normalization into [`InboundEvent`]s.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use switchboard_core::{ChannelKind, EventKind, InboundEvent, SwitchboardError};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub reply_token: Option<String>,
    pub webhook_event_id: Option<String>,
    pub timestamp: Option<i64>,
    pub source: Option<Source>,
    pub message: Option<EventMessage>,
    pub postback: Option<Postback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Postback {
    pub data: String,
}

/// Normalizes a verified body. Events without a user, or of unsupported
/// types (unfollow, join, stickers, ...), are skipped.
pub fn parse(tenant_id: &str, body: &[u8], data_base: &str) -> Result<Vec<InboundEvent>, SwitchboardError> {
    let body: WebhookBody = serde_json::from_slice(body)
        .map_err(|e| SwitchboardError::InvalidInput(format!("malformed LINE webhook body: {e}")))?;

    let mut out = Vec::with_capacity(body.events.len());
    for event in body.events {
        let Some(user_id) = event.source.as_ref().and_then(|s| s.user_id.clone()) else {
            debug!(kind = %event.kind, "skipping LINE event without a user source");
            continue;
        };
        let Some(token) = event.webhook_event_id.clone().or_else(|| event.reply_token.clone()) else {
            debug!(kind = %event.kind, "skipping LINE event without a delivery token");
            continue;
        };
        let received_at = event
            .timestamp
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        let (kind, text, attachment_url) = match (event.kind.as_str(), &event.message, &event.postback) {
            ("message", Some(msg), _) if msg.kind == "text" => (EventKind::Text, msg.text.clone(), None),
            ("message", Some(msg), _) if msg.kind == "image" => (
                EventKind::Image,
                None,
                Some(format!("{data_base}/v2/bot/message/{}/content", msg.id)),
            ),
            ("postback", _, Some(pb)) => (EventKind::Postback, Some(pb.data.clone()), None),
            ("follow", _, _) => (EventKind::Follow, None, None),
            (other, _, _) => {
                debug!(kind = other, "skipping unsupported LINE event");
                continue;
            }
        };

        out.push(InboundEvent {
            tenant_id: tenant_id.to_string(),
            channel: ChannelKind::Line,
            external_user_id: user_id,
            kind,
            text,
            attachment_url,
            delivery_token: token,
            reply_token: event.reply_token,
            received_at,
        });
    }
    Ok(out)
}
