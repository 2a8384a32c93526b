// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger webhook payload and its normalization into [`InboundEvent`]s.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use switchboard_core::{ChannelKind, EventKind, InboundEvent, SwitchboardError};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub messaging: Vec<Messaging>,
}

#[derive(Debug, Deserialize)]
pub struct Messaging {
    pub sender: Option<Party>,
    pub timestamp: Option<i64>,
    pub message: Option<Message>,
    pub postback: Option<Postback>,
}

#[derive(Debug, Deserialize)]
pub struct Party {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub mid: String,
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Postback {
    pub mid: Option<String>,
    pub title: Option<String>,
    pub payload: Option<String>,
}

/// Normalizes a verified body. Echoes of the page's own sends are dropped.
pub fn parse(tenant_id: &str, body: &[u8]) -> Result<Vec<InboundEvent>, SwitchboardError> {
    let body: WebhookBody = serde_json::from_slice(body)
        .map_err(|e| SwitchboardError::InvalidInput(format!("malformed Messenger webhook body: {e}")))?;
    if body.object.as_deref().is_some_and(|o| o != "page") {
        return Err(SwitchboardError::InvalidInput(format!(
            "unexpected webhook object {:?}",
            body.object
        )));
    }

    let mut out = Vec::new();
    for messaging in body.entry.into_iter().flat_map(|e| e.messaging) {
        let Some(sender) = messaging.sender else {
            continue;
        };
        let received_at = messaging
            .timestamp
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        let (kind, text, attachment_url, token) = if let Some(msg) = messaging.message {
            if msg.is_echo {
                debug!(mid = %msg.mid, "skipping Messenger echo");
                continue;
            }
            let image = msg
                .attachments
                .iter()
                .find(|a| a.kind == "image")
                .and_then(|a| a.payload.as_ref())
                .and_then(|p| p.url.clone());
            match (msg.text, image) {
                (Some(text), _) => (EventKind::Text, Some(text), None, msg.mid),
                (None, Some(url)) => (EventKind::Image, None, Some(url), msg.mid),
                (None, None) => {
                    debug!(mid = %msg.mid, "skipping Messenger message without text or image");
                    continue;
                }
            }
        } else if let Some(pb) = messaging.postback {
            let text = pb.payload.or(pb.title);
            let token = pb.mid.unwrap_or_else(|| {
                format!("postback:{}:{}", sender.id, received_at.timestamp_millis())
            });
            (EventKind::Postback, text, None, token)
        } else {
            continue;
        };

        out.push(InboundEvent {
            tenant_id: tenant_id.to_string(),
            channel: ChannelKind::Messenger,
            external_user_id: sender.id,
            kind,
            text,
            attachment_url,
            delivery_token: token,
            reply_token: None,
            received_at,
        });
    }
    Ok(out)
}
