// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter`, captures every accepted
//! outbound message for assertion, and can be told to reject sends or
//! profile lookups.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchboard_core::traits::adapter::PluginAdapter;
use switchboard_core::traits::channel::ChannelAdapter;
use switchboard_core::types::{
    AdapterType, ChannelKind, HealthStatus, InboundEvent, MessageId, OutboundMessage, UserProfile,
};
use switchboard_core::SwitchboardError;

/// Signature header value `verify_signature` accepts.
pub const VALID_SIGNATURE: &str = "mock-valid-signature";

/// A mock messaging channel for testing.
///
/// - **sent**: messages accepted by `send()`, retrievable via `sent_messages()`
/// - **failures**: `fail_next_sends(n)` rejects the next `n` sends,
///   `fail_all_sends(true)` rejects every send until switched back
pub struct MockChannel {
    kind: ChannelKind,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    fail_all: AtomicBool,
    profile: Mutex<UserProfile>,
    fail_profile: AtomicBool,
    profile_calls: AtomicUsize,
}

impl MockChannel {
    /// Create a new mock channel of `kind` with an empty capture.
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            sent: Arc::new(Mutex::new(Vec::new())),
            attempts: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            profile: Mutex::new(UserProfile {
                display_name: Some("Test Customer".to_string()),
                picture_url: None,
            }),
            fail_profile: AtomicBool::new(false),
            profile_calls: AtomicUsize::new(0),
        }
    }

    /// Reject the next `n` sends.
    pub fn fail_next_sends(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Reject every send while `fail` is set.
    pub fn fail_all_sends(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profile(&self, fail: bool) {
        self.fail_profile.store(fail, Ordering::SeqCst);
    }

    pub async fn set_profile(&self, profile: UserProfile) {
        *self.profile.lock().await = profile;
    }

    /// Get all messages that were accepted by `send()`.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Texts of accepted messages sent to `recipient`.
    pub async fn sent_to(&self, recipient: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.recipient_id == recipient)
            .filter_map(|m| m.text.clone())
            .collect()
    }

    /// Get the count of accepted messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Sends attempted, accepted or not.
    pub fn send_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    /// Clear all captured messages.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new(ChannelKind::Line)
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
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
impl ChannelAdapter for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn verify_signature(&self, _body: &[u8], signature: &str) -> Result<(), SwitchboardError> {
        if signature == VALID_SIGNATURE {
            Ok(())
        } else {
            Err(SwitchboardError::Signature("mock signature mismatch".to_string()))
        }
    }

    /// Bodies are a JSON array of [`InboundEvent`]; the tenant is overwritten.
    fn parse_events(
        &self,
        tenant_id: &str,
        body: &[u8],
    ) -> Result<Vec<InboundEvent>, SwitchboardError> {
        let mut events: Vec<InboundEvent> = serde_json::from_slice(body)
            .map_err(|e| SwitchboardError::InvalidInput(format!("mock webhook body: {e}")))?;
        for event in &mut events {
            event.tenant_id = tenant_id.to_string();
            event.channel = self.kind;
        }
        Ok(events)
    }

    async fn fetch_profile(&self, _user_id: &str) -> Result<UserProfile, SwitchboardError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(SwitchboardError::channel("mock profile lookup failed"));
        }
        Ok(self.profile.lock().await.clone())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, SwitchboardError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(SwitchboardError::channel("mock send rejected"));
        }
        let scripted_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(SwitchboardError::channel("mock send rejected"));
        }
        let id = format!("mock-msg-{}", uuid::Uuid::new_v4());
        self.sent.lock().await.push(msg);
        Ok(MessageId(id))
    }
}
