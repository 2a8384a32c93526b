// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for Switchboard.
//!
//! Implements [`ProviderAdapter`] for the Anthropic Messages API. Used as a
//! fallback-chain member and as the analysis provider for learning, CRM
//! extraction, and follow-ups.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use switchboard_config::model::ProviderConfig;
use switchboard_core::{
    AdapterType, HealthStatus, PluginAdapter, ProviderAdapter, ProviderRequest, ProviderResponse,
    SwitchboardError, TokenUsage,
};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest, ResponseContentBlock};

/// API key resolution order: config, then `ANTHROPIC_API_KEY`, then error.
pub struct AnthropicProvider {
    name: String,
    model: String,
    client: AnthropicClient,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, SwitchboardError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let mut client = AnthropicClient::new(&api_key, Duration::from_millis(config.timeout_ms))?;
        if let Some(base) = &config.base_url {
            client = client.with_base_url(base.clone());
        }
        info!(name = %config.name, model = %config.model, "Anthropic provider initialized");
        Ok(Self {
            name: config.name.clone(),
            model: config.model.clone(),
            client,
        })
    }

    fn to_message_request(&self, request: &ProviderRequest) -> MessageRequest {
        MessageRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            system: (!request.system_prompt.is_empty()).then(|| request.system_prompt.clone()),
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
        // No API call; health checks should not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        debug!(name = %self.name, "Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, SwitchboardError> {
        let api_request = self.to_message_request(&request);
        let response = self.client.complete_message(&api_request).await?;

        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<String>();
        if text.trim().is_empty() {
            return Err(SwitchboardError::provider(format!(
                "{} returned an empty completion (stop_reason {:?})",
                self.name, response.stop_reason
            )));
        }

        Ok(ProviderResponse {
            text,
            model: response.model,
            usage: TokenUsage {
                prompt_tokens: response.usage.input_tokens,
                completion_tokens: response.usage.output_tokens,
            },
        })
    }
}

fn resolve_api_key(config_key: &Option<String>) -> Result<String, SwitchboardError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        SwitchboardError::Config(
            "Anthropic API key not found. Set api_key on the provider or ANTHROPIC_API_KEY.".into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_config::model::ProviderKind;
    use switchboard_core::ProviderMessage;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> ProviderConfig {
        ProviderConfig {
            name: "claude".into(),
            kind: ProviderKind::Anthropic,
            model: "claude-haiku-4-5".into(),
            api_key: Some("sk-test".into()),
            base_url: Some(base.to_string()),
            timeout_ms: 5_000,
            max_tokens: 256,
        }
    }

    fn request(model: Option<&str>) -> ProviderRequest {
        ProviderRequest {
            model: model.map(str::to_string),
            system_prompt: "Be brief.".into(),
            messages: vec![ProviderMessage::user("What time do you open?")],
            max_tokens: 128,
        }
    }

    #[test]
    fn resolve_api_key_prefers_config() {
        assert_eq!(resolve_api_key(&Some("sk-1".into())).unwrap(), "sk-1");
    }

    #[test]
    fn resolve_api_key_empty_config_falls_back_to_env() {
        // Passes either way; only checks an empty key is never returned.
        if let Ok(key) = resolve_api_key(&Some(String::new())) {
            assert!(!key.is_empty());
        }
    }

    #[test]
    fn request_uses_configured_model_unless_overridden() {
        let provider = AnthropicProvider::new(&config("http://localhost")).unwrap();
        assert_eq!(provider.to_message_request(&request(None)).model, "claude-haiku-4-5");
        assert_eq!(
            provider.to_message_request(&request(Some("claude-sonnet-4-5"))).model,
            "claude-sonnet-4-5"
        );
        assert_eq!(
            provider.to_message_request(&request(None)).system.as_deref(),
            Some("Be brief.")
        );
    }

    #[tokio::test]
    async fn complete_maps_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"model": "claude-haiku-4-5", "system": "Be brief."})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1", "type": "message", "role": "assistant",
                "content": [{"type": "text", "text": "We open at 9."}],
                "model": "claude-haiku-4-5", "stop_reason": "end_turn",
                "usage": {"input_tokens": 20, "output_tokens": 6}
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(&config(&server.uri())).unwrap();
        let resp = provider.complete(request(None)).await.unwrap();
        assert_eq!(resp.text, "We open at 9.");
        assert_eq!(resp.usage, TokenUsage { prompt_tokens: 20, completion_tokens: 6 });
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_2", "type": "message", "role": "assistant",
                "content": [], "model": "claude-haiku-4-5", "stop_reason": "max_tokens",
                "usage": {"input_tokens": 20, "output_tokens": 0}
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(&config(&server.uri())).unwrap();
        assert!(matches!(
            provider.complete(request(None)).await,
            Err(SwitchboardError::Provider { .. })
        ));
    }
}
