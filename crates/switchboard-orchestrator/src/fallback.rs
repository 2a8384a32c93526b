// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI fallback chain: ordered providers, first non-empty success wins.
//!
//! Usage is recorded for every attempted provider, successful or not. When
//! every provider fails the tenant's default message is returned; the chain
//! itself never fails.

use std::future::Future;

use chrono::{DateTime, Utc};
use switchboard_core::{ProviderMessage, ProviderRequest, SwitchboardError, TokenUsage};
use switchboard_cost::{CallSite, UsageLedger};
use tracing::{debug, info, warn};

use crate::tenant::ChainMember;

/// Runs `attempt` over `items` in order and returns the first `Ok`.
///
/// Items after the first success are never touched.
pub async fn first_success<I, T, E, F, Fut>(items: I, mut attempt: F) -> Option<(I::Item, T)>
where
    I: IntoIterator,
    F: FnMut(&I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    for item in items {
        if let Ok(value) = attempt(&item).await {
            return Some((item, value));
        }
    }
    None
}

/// One question for the chain.
#[derive(Debug, Clone)]
pub struct FallbackRequest<'a> {
    pub tenant_id: &'a str,
    pub message: &'a str,
    pub history: &'a [ProviderMessage],
    pub system_prompt: &'a str,
    /// Appended to the system prompt outside business hours.
    pub off_hours_note: Option<&'a str>,
}

impl FallbackRequest<'_> {
    fn to_provider_request(&self, max_tokens: u32) -> ProviderRequest {
        let system_prompt = match self.off_hours_note {
            Some(note) => format!("{}\n\nNote: {note}", self.system_prompt),
            None => self.system_prompt.to_string(),
        };
        let mut messages = self.history.to_vec();
        messages.push(ProviderMessage::user(self.message));
        ProviderRequest {
            model: None,
            system_prompt,
            messages,
            max_tokens,
        }
    }
}

/// Where a fallback answer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackSource {
    Provider(String),
    /// Every provider failed; the tenant's configured message was used.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackReply {
    pub text: String,
    pub source: FallbackSource,
}

#[derive(Clone)]
pub struct FallbackChain {
    ledger: UsageLedger,
}

impl FallbackChain {
    pub fn new(ledger: UsageLedger) -> Self {
        Self { ledger }
    }

    pub async fn run(
        &self,
        members: &[ChainMember],
        request: &FallbackRequest<'_>,
        default_message: &str,
        now: DateTime<Utc>,
    ) -> FallbackReply {
        let winner = first_success(members, |member| {
            let member = *member;
            let provider_request = request.to_provider_request(member.max_tokens);
            async move { self.attempt(member, provider_request, request.tenant_id, now).await }
        })
        .await;

        match winner {
            Some((member, text)) => {
                info!(tenant_id = request.tenant_id, provider = member.provider.name(), "fallback chain answered");
                FallbackReply {
                    text,
                    source: FallbackSource::Provider(member.provider.name().to_string()),
                }
            }
            None => {
                warn!(
                    tenant_id = request.tenant_id,
                    providers = members.len(),
                    "all fallback providers failed, using default message"
                );
                FallbackReply {
                    text: default_message.to_string(),
                    source: FallbackSource::Default,
                }
            }
        }
    }

    async fn attempt(
        &self,
        member: &ChainMember,
        request: ProviderRequest,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, SwitchboardError> {
        let provider = &member.provider;
        let result = match tokio::time::timeout(member.timeout, provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(SwitchboardError::Timeout {
                duration: member.timeout,
            }),
        };
        let result = result.and_then(|resp| {
            if resp.text.trim().is_empty() {
                Err(SwitchboardError::provider(format!("{} returned empty text", provider.name())))
            } else {
                Ok(resp)
            }
        });

        let (model, usage, success) = match &result {
            Ok(resp) => (resp.model.clone(), resp.usage, true),
            Err(e) => {
                warn!(tenant_id, provider = provider.name(), error = %e, "fallback provider failed");
                (provider.default_model().to_string(), TokenUsage::default(), false)
            }
        };
        if let Err(e) = self
            .ledger
            .record_call(tenant_id, provider.name(), &model, CallSite::Fallback, usage, success, now)
            .await
        {
            warn!(tenant_id, provider = provider.name(), error = %e, "failed to record fallback usage");
        }
        debug!(tenant_id, provider = provider.name(), success, "fallback attempt finished");
        result.map(|resp| resp.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_success_stops_at_first_ok() {
        let mut touched = Vec::new();
        let result = first_success([1, 2, 3], |n| {
            touched.push(*n);
            let n = *n;
            async move { if n == 2 { Ok(n * 10) } else { Err(()) } }
        })
        .await;
        assert_eq!(result, Some((2, 20)));
        assert_eq!(touched, vec![1, 2]);
    }

    #[tokio::test]
    async fn first_success_none_when_all_fail() {
        let result = first_success(Vec::<u8>::new(), |_| async { Ok::<_, ()>(()) }).await;
        assert!(result.is_none());
        let result = first_success([1, 2], |_| async { Err::<(), _>("no") }).await;
        assert!(result.is_none());
    }

    #[test]
    fn off_hours_note_extends_system_prompt() {
        let history = vec![ProviderMessage::user("hi"), ProviderMessage::assistant("hello")];
        let req = FallbackRequest {
            tenant_id: "t",
            message: "open now?",
            history: &history,
            system_prompt: "Be nice.",
            off_hours_note: Some("We are closed."),
        }
        .to_provider_request(100);
        assert!(req.system_prompt.ends_with("Note: We are closed."));
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[2].content, "open now?");
    }
}
