// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock fallback provider for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with a scripted queue of
//! replies, failures, and empty completions, enabling fast tests of the
//! fallback chain without external API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchboard_core::traits::adapter::PluginAdapter;
use switchboard_core::traits::provider::ProviderAdapter;
use switchboard_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage,
};
use switchboard_core::SwitchboardError;

/// Usage reported for every successful mock completion.
pub const MOCK_USAGE: TokenUsage = TokenUsage {
    prompt_tokens: 10,
    completion_tokens: 20,
};

#[derive(Debug, Clone)]
enum Step {
    Reply(String),
    Fail,
    Empty,
}

/// A mock provider that plays back a script.
///
/// Steps are popped from a FIFO queue. When the queue is empty, a default
/// "mock response" text is returned.
pub struct MockProvider {
    name: String,
    model: String,
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProviderRequest>>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock provider with an empty script.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            model: format!("{name}-model"),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a successful reply.
    pub fn reply(mut self, text: &str) -> Self {
        self.script.get_mut().push_back(Step::Reply(text.to_string()));
        self
    }

    /// Queue a failed call.
    pub fn fail(mut self) -> Self {
        self.script.get_mut().push_back(Step::Fail);
        self
    }

    /// Queue a call that succeeds with blank text.
    pub fn empty(mut self) -> Self {
        self.script.get_mut().push_back(Step::Empty);
        self
    }

    /// Fail every call (a provider that is down).
    pub fn failing(name: &str) -> Self {
        let mut provider = Self::new(name);
        provider.script.get_mut().extend(std::iter::repeat_n(Step::Fail, 64));
        provider
    }

    /// Add a reply to the end of the script.
    pub async fn add_reply(&self, text: &str) {
        self.script.lock().await.push_back(Step::Reply(text.to_string()));
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
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
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, SwitchboardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        self.requests.lock().await.push(request);
        let step = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Step::Reply("mock response".to_string()));
        let text = match step {
            Step::Reply(text) => text,
            Step::Empty => String::new(),
            Step::Fail => {
                return Err(SwitchboardError::provider(format!("{} is unavailable", self.name)));
            }
        };
        Ok(ProviderResponse {
            text,
            model,
            usage: MOCK_USAGE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::types::ProviderMessage;

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: None,
            system_prompt: "be brief".into(),
            messages: vec![ProviderMessage::user("hi")],
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn plays_script_then_default() {
        let provider = MockProvider::new("a").fail().empty().reply("third");
        assert!(provider.complete(request()).await.is_err());
        assert_eq!(provider.complete(request()).await.unwrap().text, "");
        let third = provider.complete(request()).await.unwrap();
        assert_eq!(third.text, "third");
        assert_eq!(third.model, "a-model");
        assert_eq!(third.usage, MOCK_USAGE);
        assert_eq!(provider.complete(request()).await.unwrap().text, "mock response");
        assert_eq!(provider.calls(), 4);
        assert_eq!(provider.requests().await.len(), 4);
    }

    #[tokio::test]
    async fn failing_provider_never_answers() {
        let provider = MockProvider::failing("down");
        for _ in 0..3 {
            assert!(provider.complete(request()).await.is_err());
        }
    }
}
