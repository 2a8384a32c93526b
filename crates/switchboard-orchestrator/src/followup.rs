// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up analysis job.
//!
//! Finds conversations where the customer spoke last and nobody answered
//! for a while, and flags them for an admin. With an analysis provider the
//! model decides and writes the reason; without one (or when it fails) a
//! heuristic does.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use switchboard_core::records::{Conversation, FollowUp, MessageRole, normalize_question};
use switchboard_core::state::gap_reason;
use switchboard_core::{BotState, ProviderAdapter, ProviderMessage, ProviderRequest, SwitchboardError, TokenUsage};
use switchboard_cost::{CallSite, UsageLedger};
use switchboard_storage::ConversationStore;
use tracing::{debug, info, warn};

use crate::tenant::TenantContext;

const FOLLOWUP_PROMPT: &str = r#"You review a customer-service chat in which the customer sent the
last message and has not been answered. Decide whether a staff member should
follow up. Reply with ONLY a JSON object:
{"needs_followup": true | false, "reason": "<one short sentence>"}"#;

/// Closing remarks that need no answer.
const CLOSINGS: &[&str] = &[
    "thanks", "thank you", "thx", "ok", "okay", "bye", "got it", "ขอบคุณ", "ขอบคุณครับ", "ขอบคุณค่ะ",
    "โอเค", "ครับ", "ค่ะ",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowupReport {
    pub analyzed: usize,
    pub flagged: usize,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    needs_followup: bool,
    #[serde(default)]
    reason: String,
}

fn parse_verdict(response: &str) -> Option<Verdict> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}

/// Decision used when no model answer is available.
pub fn heuristic(conversation: &Conversation, now: DateTime<Utc>) -> (bool, String) {
    let last = conversation.last_message.as_deref().unwrap_or_default();
    if CLOSINGS.contains(&normalize_question(last).trim_end_matches(['!', '.']).trim()) {
        return (false, "customer closed the conversation".to_string());
    }
    let waited = conversation
        .last_message_at
        .map(|at| gap_reason(now - at).replace("returned after", "waiting"))
        .unwrap_or_else(|| "waiting".to_string());
    let reason = match conversation.control.state {
        BotState::Escalated => format!("asked for staff, {waited}"),
        BotState::AutoPinned => format!("auto-pinned and unanswered, {waited}"),
        BotState::Manual | BotState::Normal => format!("unanswered customer message, {waited}"),
    };
    (true, reason)
}

#[derive(Clone)]
pub struct FollowupAnalyzer {
    store: ConversationStore,
    ledger: UsageLedger,
    idle: Duration,
    lookback: Duration,
    history: u32,
    max_tokens: u32,
}

impl FollowupAnalyzer {
    pub fn new(
        store: ConversationStore,
        ledger: UsageLedger,
        idle_minutes: u32,
        lookback_hours: u32,
        history: u32,
    ) -> Self {
        Self {
            store,
            ledger,
            idle: Duration::minutes(i64::from(idle_minutes)),
            lookback: Duration::hours(i64::from(lookback_hours)),
            history,
            max_tokens: 256,
        }
    }

    /// Analyzes every idle conversation of one tenant.
    ///
    /// Each conversation is analyzed once per customer message; the stored
    /// `analyzed_at` keeps it out of later runs until the customer writes again.
    pub async fn run(
        &self,
        tenant: &TenantContext,
        now: DateTime<Utc>,
    ) -> Result<FollowupReport, SwitchboardError> {
        let idle = self
            .store
            .idle_conversations(tenant.id(), now - self.lookback, now - self.idle)
            .await?;
        let mut report = FollowupReport::default();
        for conversation in idle {
            let (needs_followup, reason) = match tenant.analysis_provider() {
                Some(provider) => match self.ask(provider.as_ref(), &conversation, now).await {
                    Ok(verdict) => (verdict.needs_followup, verdict.reason),
                    Err(e) => {
                        warn!(
                            tenant_id = tenant.id(),
                            user_id = %conversation.user_id,
                            error = %e,
                            "follow-up analysis failed, using heuristic"
                        );
                        heuristic(&conversation, now)
                    }
                },
                None => heuristic(&conversation, now),
            };
            self.store
                .set_followup(&FollowUp {
                    tenant_id: conversation.tenant_id.clone(),
                    user_id: conversation.user_id.clone(),
                    needs_followup,
                    reason: Some(reason).filter(|r| !r.is_empty()),
                    analyzed_at: now,
                })
                .await?;
            report.analyzed += 1;
            if needs_followup {
                report.flagged += 1;
            }
        }
        if report.analyzed > 0 {
            info!(
                tenant_id = tenant.id(),
                analyzed = report.analyzed,
                flagged = report.flagged,
                "follow-up analysis finished"
            );
        }
        Ok(report)
    }

    async fn ask(
        &self,
        provider: &dyn ProviderAdapter,
        conversation: &Conversation,
        now: DateTime<Utc>,
    ) -> Result<Verdict, SwitchboardError> {
        let tenant_id = conversation.tenant_id.as_str();
        let messages = self
            .store
            .recent_messages(tenant_id, &conversation.user_id, self.history)
            .await?;
        let transcript = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| format!("{}: {}", m.role, m.text))
            .collect::<Vec<_>>()
            .join("\n");

        let request = ProviderRequest {
            model: None,
            system_prompt: FOLLOWUP_PROMPT.to_string(),
            messages: vec![ProviderMessage::user(transcript)],
            max_tokens: self.max_tokens,
        };
        let result = provider.complete(request).await;
        let (model, usage, success) = match &result {
            Ok(resp) => (resp.model.clone(), resp.usage, true),
            Err(_) => (provider.default_model().to_string(), TokenUsage::default(), false),
        };
        if let Err(e) = self
            .ledger
            .record_call(tenant_id, provider.name(), &model, CallSite::Followup, usage, success, now)
            .await
        {
            warn!(tenant_id, error = %e, "failed to record follow-up usage");
        }
        let response = result?;
        debug!(tenant_id, user_id = %conversation.user_id, "follow-up verdict received");
        parse_verdict(&response.text)
            .ok_or_else(|| SwitchboardError::provider("follow-up verdict was not valid JSON"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{ChannelKind, ConversationControl};

    fn conversation(last: &str, state: BotState, at: DateTime<Utc>) -> Conversation {
        Conversation {
            tenant_id: "t".into(),
            user_id: "u".into(),
            display_name: None,
            picture_url: None,
            source: ChannelKind::Line,
            control: ConversationControl {
                state,
                pin: None,
                assigned_admin: None,
            },
            control_version: 0,
            last_message: Some(last.into()),
            last_message_at: Some(at),
            last_message_role: Some(MessageRole::Customer),
            unread_count: 1,
            message_count: 3,
            created_at: at,
        }
    }

    #[test]
    fn closing_remarks_need_no_followup() {
        let now = Utc::now();
        let (needs, _) = heuristic(&conversation("Thanks!", BotState::Normal, now - Duration::hours(1)), now);
        assert!(!needs);
        let (needs, _) = heuristic(&conversation("ขอบคุณค่ะ", BotState::Normal, now - Duration::hours(1)), now);
        assert!(!needs);
    }

    #[test]
    fn open_questions_are_flagged_with_wait_time() {
        let now = Utc::now();
        let conv = conversation("Is the blue one in stock?", BotState::Escalated, now - Duration::minutes(95));
        let (needs, reason) = heuristic(&conv, now);
        assert!(needs);
        assert_eq!(reason, "asked for staff, waiting 1h 35m");
    }

    #[test]
    fn verdict_parses_from_wrapped_json() {
        let v = parse_verdict("Sure: {\"needs_followup\": true, \"reason\": \"asked for price\"}").unwrap();
        assert!(v.needs_followup);
        assert_eq!(v.reason, "asked for price");
        assert!(parse_verdict("maybe").is_none());
    }
}
