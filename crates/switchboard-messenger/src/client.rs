// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph API client for the Send API and user profiles.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use switchboard_core::{SwitchboardError, UserProfile};
use tracing::debug;

pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    first_name: Option<String>,
    last_name: Option<String>,
    profile_pic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    code: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MessengerClient {
    client: reqwest::Client,
    page_access_token: String,
    base_url: String,
}

impl MessengerClient {
    pub fn new(
        page_access_token: &str,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SwitchboardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwitchboardError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            page_access_token: page_access_token.to_string(),
            base_url: base_url.unwrap_or_else(|| GRAPH_API_BASE.to_string()),
        })
    }

    pub async fn send_text(&self, psid: &str, text: &str) -> Result<String, SwitchboardError> {
        self.send(psid, json!({ "text": text })).await
    }

    pub async fn send_image(&self, psid: &str, url: &str) -> Result<String, SwitchboardError> {
        self.send(
            psid,
            json!({
                "attachment": {
                    "type": "image",
                    "payload": { "url": url, "is_reusable": true }
                }
            }),
        )
        .await
    }

    async fn send(&self, psid: &str, message: Value) -> Result<String, SwitchboardError> {
        let url = format!("{}/me/messages", self.base_url);
        let body = json!({
            "recipient": { "id": psid },
            "messaging_type": "RESPONSE",
            "message": message,
        });
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", self.page_access_token.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!(%status, "Messenger Send API response");
        if !status.is_success() {
            return Err(graph_error(status, &text));
        }
        let parsed: SendResponse = serde_json::from_str(&text).map_err(|e| SwitchboardError::Channel {
            message: format!("failed to parse Send API response: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(parsed.message_id.unwrap_or_default())
    }

    pub async fn profile(&self, psid: &str) -> Result<UserProfile, SwitchboardError> {
        let url = format!("{}/{psid}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", "first_name,last_name,profile_pic"),
                ("access_token", self.page_access_token.as_str()),
            ])
            .send()
            .await
            .map_err(request_failed)?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(graph_error(status, &text));
        }
        let profile: ProfileResponse = serde_json::from_str(&text).map_err(|e| SwitchboardError::Channel {
            message: format!("failed to parse Messenger profile: {e}"),
            source: Some(Box::new(e)),
        })?;
        let name = [profile.first_name, profile.last_name]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        Ok(UserProfile {
            display_name: (!name.is_empty()).then_some(name),
            picture_url: profile.profile_pic,
        })
    }
}

fn request_failed(e: reqwest::Error) -> SwitchboardError {
    SwitchboardError::Channel {
        message: format!("Messenger request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

fn graph_error(status: reqwest::StatusCode, body: &str) -> SwitchboardError {
    match serde_json::from_str::<GraphErrorBody>(body) {
        Ok(b) => SwitchboardError::channel(format!(
            "Graph API error ({status}, code {}): {}",
            b.error.code.unwrap_or_default(),
            b.error.message
        )),
        Err(_) => SwitchboardError::channel(format!("Graph API returned {status}: {body}")),
    }
}
