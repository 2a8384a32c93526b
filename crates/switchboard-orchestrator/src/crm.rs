// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRM auto-extraction: a cheap trigger evaluated after each delivered
//! reply, and the extraction job it fires in the background.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use switchboard_core::crm::{CrmProfile, ProfileFields};
use switchboard_core::records::MessageRole;
use switchboard_core::{ProviderAdapter, ProviderMessage, ProviderRequest, SwitchboardError, TokenUsage};
use switchboard_cost::{CallSite, UsageLedger};
use switchboard_storage::ConversationStore;
use tracing::{debug, info, warn};

static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+?\d[\d\s-]{7,}\d").unwrap());

static SELF_INTRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(my name is|i am|i'm|call me|this is)\b|ผมชื่อ|ฉันชื่อ|ดิฉันชื่อ|หนูชื่อ").unwrap()
});

static PURCHASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(buy|order|purchase|pay|paid|transfer|checkout|deliver to)\b|สั่งซื้อ|ซื้อ|โอนเงิน|ชำระ|จัดส่ง")
        .unwrap()
});

const EXTRACTION_PROMPT: &str = r#"You maintain a CRM record for a shop's customer. Read the conversation
and reply with ONLY a JSON object using these keys, leaving out anything the
customer did not state:
{
  "name": string, "phone": string, "email": string, "address": string,
  "note": string,
  "purchase_intent": "hot" | "warm" | "cold" | "purchased",
  "stage": "lead" | "prospect" | "customer" | "churned",
  "tags": [string], "interested_products": [string]
}"#;

/// Why extraction fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmTrigger {
    MessageCount,
    Phone,
    SelfIntroduction,
    PurchaseIntent,
}

impl CrmTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageCount => "message_count",
            Self::Phone => "phone",
            Self::SelfIntroduction => "self_introduction",
            Self::PurchaseIntent => "purchase_intent",
        }
    }
}

/// Decides whether a turn warrants extraction.
///
/// `count_before` and `count_after` are the conversation's message counts
/// around the turn; crossing a multiple of `threshold` fires.
pub fn crm_trigger(count_before: i64, count_after: i64, threshold: u32, text: &str) -> Option<CrmTrigger> {
    let threshold = i64::from(threshold);
    if threshold > 0 && count_after / threshold > count_before / threshold {
        return Some(CrmTrigger::MessageCount);
    }
    if PHONE.is_match(text) {
        Some(CrmTrigger::Phone)
    } else if SELF_INTRO.is_match(text) {
        Some(CrmTrigger::SelfIntroduction)
    } else if PURCHASE.is_match(text) {
        Some(CrmTrigger::PurchaseIntent)
    } else {
        None
    }
}

/// Extracts the JSON object from a model reply.
pub fn parse_profile_fields(response: &str) -> Option<ProfileFields> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str(&response[start..=end]) {
        Ok(fields) => Some(fields),
        Err(e) => {
            warn!("failed to parse CRM extraction: {e}");
            debug!("raw CRM extraction response: {response}");
            None
        }
    }
}

#[derive(Clone)]
pub struct CrmExtractor {
    store: ConversationStore,
    ledger: UsageLedger,
    history: u32,
    max_tokens: u32,
}

impl CrmExtractor {
    pub fn new(store: ConversationStore, ledger: UsageLedger, history: u32, max_tokens: u32) -> Self {
        Self {
            store,
            ledger,
            history,
            max_tokens,
        }
    }

    /// Runs one extraction and merges the result.
    ///
    /// Returns the stored profile when the merge changed something.
    pub async fn extract(
        &self,
        provider: &dyn ProviderAdapter,
        tenant_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CrmProfile>, SwitchboardError> {
        let messages = self.store.recent_messages(tenant_id, user_id, self.history).await?;
        let transcript = messages
            .iter()
            .filter(|m| m.role != MessageRole::System && !m.text.is_empty())
            .map(|m| format!("{}: {}", m.role, m.text))
            .collect::<Vec<_>>()
            .join("\n");
        if transcript.is_empty() {
            return Ok(None);
        }

        let request = ProviderRequest {
            model: None,
            system_prompt: EXTRACTION_PROMPT.to_string(),
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
            .record_call(tenant_id, provider.name(), &model, CallSite::Crm, usage, success, now)
            .await
        {
            warn!(tenant_id, error = %e, "failed to record CRM usage");
        }
        let response = result?;

        let Some(fields) = parse_profile_fields(&response.text) else {
            return Ok(None);
        };
        let merged = self.store.merge_crm_extraction(tenant_id, user_id, &fields, now).await?;
        if merged.is_some() {
            info!(tenant_id, user_id, "CRM profile updated from conversation");
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::crm::PurchaseIntent;

    #[test]
    fn count_threshold_fires_on_crossing() {
        assert_eq!(crm_trigger(6, 8, 8, "ok"), Some(CrmTrigger::MessageCount));
        assert_eq!(crm_trigger(7, 9, 8, "ok"), Some(CrmTrigger::MessageCount));
        assert_eq!(crm_trigger(8, 10, 8, "ok"), None);
        assert_eq!(crm_trigger(0, 2, 0, "ok"), None);
    }

    #[test]
    fn regex_signals() {
        assert_eq!(crm_trigger(0, 2, 8, "call me at 081-234-5678"), Some(CrmTrigger::Phone));
        assert_eq!(crm_trigger(0, 2, 8, "Hi, my name is Dao"), Some(CrmTrigger::SelfIntroduction));
        assert_eq!(crm_trigger(0, 2, 8, "ผมชื่อสมชาย"), Some(CrmTrigger::SelfIntroduction));
        assert_eq!(crm_trigger(0, 2, 8, "I'd like to order two"), Some(CrmTrigger::PurchaseIntent));
        assert_eq!(crm_trigger(0, 2, 8, "what colours do you have"), None);
    }

    #[test]
    fn parses_fenced_json() {
        let reply = "Here you go:\n```json\n{\"name\": \"Dao\", \"purchase_intent\": \"hot\", \"tags\": [\"vip\"]}\n```";
        let fields = parse_profile_fields(reply).unwrap();
        assert_eq!(fields.name.as_deref(), Some("Dao"));
        assert_eq!(fields.purchase_intent, Some(PurchaseIntent::Hot));
        assert_eq!(fields.tags, vec!["vip".to_string()]);
        assert!(fields.phone.is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_profile_fields("no json here").is_none());
        assert!(parse_profile_fields("{not json}").is_none());
    }
}
