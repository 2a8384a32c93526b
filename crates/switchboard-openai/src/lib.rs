// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider adapter for Switchboard.
//!
//! Works with any endpoint speaking the chat completions protocol; point
//! `base_url` at a gateway to use other model vendors.

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

use crate::client::OpenAiClient;
use crate::types::{ChatMessage, ChatRequest};

pub struct OpenAiProvider {
    name: String,
    model: String,
    client: OpenAiClient,
}

impl OpenAiProvider {
    /// API key resolution order: config, then `OPENAI_API_KEY`, then error.
    pub fn new(config: &ProviderConfig) -> Result<Self, SwitchboardError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let mut client = OpenAiClient::new(&api_key, Duration::from_millis(config.timeout_ms))?;
        if let Some(base) = &config.base_url {
            client = client.with_base_url(base.clone());
        }
        info!(name = %config.name, model = %config.model, "OpenAI provider initialized");
        Ok(Self {
            name: config.name.clone(),
            model: config.model.clone(),
            client,
        })
    }

    fn to_chat_request(&self, request: &ProviderRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".into(),
                content: request.system_prompt.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        }));
        ChatRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
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
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        debug!(name = %self.name, "OpenAI provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, SwitchboardError> {
        let response = self.client.chat(&self.to_chat_request(&request)).await?;
        let usage = response.usage.unwrap_or_default();
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SwitchboardError::provider(format!("{} returned an empty completion", self.name)))?;

        Ok(ProviderResponse {
            text,
            model: response.model,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
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

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        SwitchboardError::Config(
            "OpenAI API key not found. Set api_key on the provider or OPENAI_API_KEY.".into(),
        )
    })
}
