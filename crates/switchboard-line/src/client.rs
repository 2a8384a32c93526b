// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the LINE Messaging API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use switchboard_core::{SwitchboardError, UserProfile};
use tracing::{debug, warn};

pub const API_BASE: &str = "https://api.line.me";
pub const DATA_API_BASE: &str = "https://api-data.line.me";

/// One LINE message object.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LineMessage {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        original_content_url: String,
        preview_image_url: String,
    },
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default, rename = "sentMessages")]
    sent_messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    display_name: Option<String>,
    picture_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Clone)]
pub struct LineClient {
    client: reqwest::Client,
    base_url: String,
}

impl LineClient {
    pub fn new(access_token: &str, base_url: Option<String>, timeout: Duration) -> Result<Self, SwitchboardError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|e| SwitchboardError::Config(format!("invalid LINE access token: {e}")))?,
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SwitchboardError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| API_BASE.to_string()),
        })
    }

    /// Answers an event with its reply token. Tokens are single-use and expire quickly.
    pub async fn reply(&self, reply_token: &str, messages: &[LineMessage]) -> Result<String, SwitchboardError> {
        self.post(
            "/v2/bot/message/reply",
            json!({ "replyToken": reply_token, "messages": messages }),
        )
        .await
    }

    pub async fn push(&self, to: &str, messages: &[LineMessage]) -> Result<String, SwitchboardError> {
        self.post("/v2/bot/message/push", json!({ "to": to, "messages": messages }))
            .await
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, SwitchboardError> {
        let url = format!("{}/v2/bot/profile/{user_id}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(request_failed)?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        let profile: ProfileResponse = serde_json::from_str(&body).map_err(|e| SwitchboardError::Channel {
            message: format!("failed to parse LINE profile: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(UserProfile {
            display_name: profile.display_name,
            picture_url: profile.picture_url,
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<String, SwitchboardError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-line-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();
        debug!(status = %status, path, "LINE API response");
        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        let sent = serde_json::from_str::<SendResponse>(&text)
            .ok()
            .and_then(|r| r.sent_messages.into_iter().next())
            .map(|m| m.id);
        Ok(sent.or(request_id).unwrap_or_else(|| "line".to_string()))
    }
}

fn request_failed(e: reqwest::Error) -> SwitchboardError {
    SwitchboardError::Channel {
        message: format!("LINE request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> SwitchboardError {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(err) => format!("LINE API error ({status}): {}", err.message),
        Err(_) => format!("LINE API returned {status}: {body}"),
    };
    if status.is_server_error() {
        warn!(%status, "LINE API server error");
    }
    SwitchboardError::channel(message)
}
