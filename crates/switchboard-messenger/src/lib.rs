// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Facebook Messenger channel adapter for Switchboard.
//!
//! Messenger has no reply tokens; every outbound message goes through the
//! Send API addressed by page-scoped user id.

pub mod client;
pub mod signature;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use switchboard_config::model::MessengerConfig;
use switchboard_core::{
    AdapterType, ChannelAdapter, ChannelKind, HealthStatus, InboundEvent, MessageId,
    OutboundMessage, PluginAdapter, SwitchboardError, UserProfile,
};
use tracing::warn;

use crate::client::MessengerClient;

const PROFILE_RETRY_DELAY: Duration = Duration::from_millis(300);

pub struct MessengerChannel {
    app_secret: String,
    verify_token: String,
    client: MessengerClient,
}

impl MessengerChannel {
    pub fn new(config: &MessengerConfig, timeout: Duration) -> Result<Self, SwitchboardError> {
        if config.app_secret.is_empty() || config.page_access_token.is_empty() {
            return Err(SwitchboardError::Config(
                "Messenger app_secret and page_access_token are required".into(),
            ));
        }
        Ok(Self {
            app_secret: config.app_secret.clone(),
            verify_token: config.verify_token.clone(),
            client: MessengerClient::new(&config.page_access_token, config.api_base.clone(), timeout)?,
        })
    }

    /// Subscription handshake for `GET` webhook requests.
    pub fn verify_subscription(
        &self,
        mode: Option<&str>,
        token: Option<&str>,
        challenge: Option<&str>,
    ) -> Option<String> {
        signature::verify_subscription(&self.verify_token, mode, token, challenge)
    }
}

#[async_trait]
impl PluginAdapter for MessengerChannel {
    fn name(&self) -> &str {
        "messenger"
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
impl ChannelAdapter for MessengerChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Messenger
    }

    fn verify_signature(&self, body: &[u8], signature: &str) -> Result<(), SwitchboardError> {
        signature::verify(&self.app_secret, body, signature)
    }

    fn parse_events(&self, tenant_id: &str, body: &[u8]) -> Result<Vec<InboundEvent>, SwitchboardError> {
        webhook::parse(tenant_id, body)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, SwitchboardError> {
        match self.client.profile(user_id).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                warn!(user_id, error = %e, "Messenger profile fetch failed, retrying once");
                tokio::time::sleep(PROFILE_RETRY_DELAY).await;
                self.client.profile(user_id).await
            }
        }
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, SwitchboardError> {
        let text = msg.text.as_deref().filter(|t| !t.is_empty());
        if text.is_none() && msg.media_url.is_none() {
            return Err(SwitchboardError::InvalidInput("outbound message is empty".into()));
        }
        let mut last_id = String::new();
        if let Some(text) = text {
            last_id = self.client.send_text(&msg.recipient_id, text).await?;
        }
        if let Some(url) = &msg.media_url {
            last_id = self.client.send_image(&msg.recipient_id, url).await?;
        }
        Ok(MessageId(last_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::EventKind;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(base: &str) -> MessengerChannel {
        MessengerChannel::new(
            &MessengerConfig {
                app_secret: "app".into(),
                page_access_token: "page-token".into(),
                verify_token: "vt".into(),
                api_base: Some(base.to_string()),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn parses_messages_and_skips_echoes() {
        let ch = channel("http://localhost");
        let body = br#"{"object":"page","entry":[{"id":"P","time":1,"messaging":[
            {"sender":{"id":"S1"},"recipient":{"id":"P"},"timestamp":1700000000000,
             "message":{"mid":"m.1","text":"price?"}},
            {"sender":{"id":"P"},"recipient":{"id":"S1"},"message":{"mid":"m.2","text":"echo","is_echo":true}},
            {"sender":{"id":"S1"},"recipient":{"id":"P"},
             "message":{"mid":"m.3","attachments":[{"type":"image","payload":{"url":"https://cdn/x.jpg"}}]}},
            {"sender":{"id":"S1"},"recipient":{"id":"P"},"postback":{"mid":"m.4","title":"Menu","payload":"MENU"}},
            {"sender":{"id":"S1"},"recipient":{"id":"P"},"read":{"watermark":1}}
        ]}]}"#;
        let events = ch.parse_events("shop", body).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].text.as_deref(), Some("price?"));
        assert_eq!(events[0].delivery_token, "m.1");
        assert_eq!(events[1].kind, EventKind::Image);
        assert_eq!(events[1].attachment_url.as_deref(), Some("https://cdn/x.jpg"));
        assert_eq!(events[2].kind, EventKind::Postback);
        assert_eq!(events[2].text.as_deref(), Some("MENU"));
        assert!(events.iter().all(|e| e.reply_token.is_none()));
    }

    #[test]
    fn rejects_non_page_objects() {
        let ch = channel("http://localhost");
        assert!(ch.parse_events("shop", br#"{"object":"instagram","entry":[]}"#).is_err());
    }

    #[test]
    fn subscription_uses_configured_token() {
        let ch = channel("http://localhost");
        assert_eq!(
            ch.verify_subscription(Some("subscribe"), Some("vt"), Some("c")),
            Some("c".into())
        );
        assert_eq!(ch.verify_subscription(Some("subscribe"), Some("x"), Some("c")), None);
    }

    #[tokio::test]
    async fn send_posts_to_send_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(query_param("access_token", "page-token"))
            .and(body_partial_json(serde_json::json!({
                "recipient": {"id": "S1"},
                "messaging_type": "RESPONSE",
                "message": {"text": "hello"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"recipient_id": "S1", "message_id": "mid.out"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let id = channel(&server.uri())
            .send(OutboundMessage::push("S1", "hello"))
            .await
            .unwrap();
        assert_eq!(id, MessageId("mid.out".into()));
    }

    #[tokio::test]
    async fn send_failure_is_channel_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                serde_json::json!({"error": {"message": "outside allowed window", "code": 10}}),
            ))
            .mount(&server)
            .await;
        let err = channel(&server.uri())
            .send(OutboundMessage::push("S1", "hello"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("outside allowed window"));
    }

    #[tokio::test]
    async fn profile_joins_names_and_retries_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/S1"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/S1"))
            .and(query_param("fields", "first_name,last_name,profile_pic"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"first_name": "Ann", "last_name": "Lee", "profile_pic": "https://p"}),
            ))
            .mount(&server)
            .await;

        let profile = channel(&server.uri()).fetch_profile("S1").await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ann Lee"));
        assert_eq!(profile.picture_url.as_deref(), Some("https://p"));
    }
}
