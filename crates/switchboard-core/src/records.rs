// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted record types for the shared store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::state::ConversationControl;
use crate::types::ChannelKind;

/// One conversation per (tenant, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub tenant_id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub source: ChannelKind,
    pub control: ConversationControl,
    /// Bumped on every control write; used for compare-and-set updates.
    pub control_version: i64,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_role: Option<MessageRole>,
    pub unread_count: i64,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    Customer,
    Bot,
    Admin,
    /// State-change notes (escalation, cancel, auto-pin).
    System,
}

/// Kind of media attached to a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    File,
}

/// Which resolver layer produced a bot reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerProvenance {
    pub layer: i64,
    pub layer_name: String,
}

/// A message to append to a conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: MessageRole,
    pub text: String,
    pub attachment_kind: Option<AttachmentKind>,
    pub attachment_url: Option<String>,
    pub provenance: Option<LayerProvenance>,
    /// Admin username for admin messages.
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn text(role: MessageRole, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            role,
            text: text.into(),
            attachment_kind: None,
            attachment_url: None,
            provenance: None,
            author: None,
            created_at,
        }
    }

    pub fn with_provenance(mut self, provenance: LayerProvenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn with_attachment(mut self, kind: AttachmentKind, url: impl Into<String>) -> Self {
        self.attachment_kind = Some(kind);
        self.attachment_url = Some(url.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Short preview stored on the conversation summary.
    pub fn preview(&self) -> String {
        if !self.text.is_empty() {
            return self.text.chars().take(200).collect();
        }
        match self.attachment_kind {
            Some(kind) => format!("[{kind}]"),
            None => String::new(),
        }
    }
}

/// A stored message; immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Insertion sequence; the log order.
    pub seq: i64,
    pub tenant_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub text: String,
    pub attachment_kind: Option<AttachmentKind>,
    pub attachment_url: Option<String>,
    pub provenance: Option<LayerProvenance>,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Follow-up flag for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub tenant_id: String,
    pub user_id: String,
    pub needs_followup: bool,
    pub reason: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Admin-facing action recorded in the activity log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdminAction {
    SendMessage,
    SendMedia,
    ToggleBot,
    ToggleTenantBot,
    Pin,
    Unpin,
    Assign,
    Unassign,
    MarkRead,
    RecordCorrection,
    DismissFollowup,
    SaveCrm,
    ToggleLearned,
    DeleteLearned,
    ReviewQa,
    DeleteConversation,
    /// System entries: an escalation happened and a notification was attempted.
    EscalationNotified,
    AutoPinned,
    EscalationCancelled,
}

/// Append-only audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub tenant_id: String,
    pub username: String,
    pub action: AdminAction,
    pub target_user: Option<String>,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Activity entry before it is assigned an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub username: String,
    pub action: AdminAction,
    pub target_user: Option<String>,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Username used for activity written by the engine itself.
pub const SYSTEM_USER: &str = "system";

/// Learned entity kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LearnedKind {
    Intent,
    Knowledge,
    Script,
}

/// An intent trigger, knowledge document, or script learned from a correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedEntry {
    pub id: String,
    pub tenant_id: String,
    pub kind: LearnedKind,
    pub title: String,
    pub source_question: String,
    pub answer: String,
    pub triggers: Vec<String>,
    pub confidence: f64,
    pub enabled: bool,
    pub hit_count: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Enabled learned entries handed to the resolver for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnedData {
    pub intents: Vec<LearnedEntry>,
    pub knowledge: Vec<LearnedEntry>,
    pub scripts: Vec<LearnedEntry>,
}

impl LearnedData {
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && self.knowledge.is_empty() && self.scripts.is_empty()
    }

    pub fn push(&mut self, entry: LearnedEntry) {
        match entry.kind {
            LearnedKind::Intent => self.intents.push(entry),
            LearnedKind::Knowledge => self.knowledge.push(entry),
            LearnedKind::Script => self.scripts.push(entry),
        }
    }
}

/// An admin correction of a bot answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub admin: String,
    pub question: String,
    pub bot_answer: String,
    pub admin_answer: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregated unanswered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissEntry {
    pub tenant_id: String,
    pub normalized: String,
    pub count: i64,
    pub examples: Vec<String>,
    pub last_seen_at: DateTime<Utc>,
}

/// Review status of a logged bot reply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// A bot reply logged for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaLogEntry {
    pub id: i64,
    pub tenant_id: String,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub layer: i64,
    pub layer_name: String,
    pub review_status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

/// One AI call, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEntry {
    pub tenant_id: String,
    pub provider: String,
    pub model: String,
    /// Where the call was made from, e.g. "fallback", "learning", "crm".
    pub call_site: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: f64,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Usage aggregated per (tenant, date, model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub tenant_id: String,
    pub date: NaiveDate,
    pub model: String,
    pub calls: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cost_usd: f64,
}

/// All-time usage for a tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub calls: i64,
    pub failed_calls: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cost_usd: f64,
}

/// Cached per-day summary of a tenant's activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyDigest {
    pub tenant_id: String,
    pub date: NaiveDate,
    pub new_conversations: i64,
    pub active_conversations: i64,
    pub customer_messages: i64,
    pub bot_messages: i64,
    pub admin_messages: i64,
    pub escalations: i64,
    pub auto_pins: i64,
    pub top_misses: Vec<(String, i64)>,
    pub cost_usd: f64,
    pub generated_at: DateTime<Utc>,
}

/// Per-admin activity counts over a time range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub username: String,
    pub total: i64,
    pub by_action: Vec<(AdminAction, i64)>,
}

/// Lower-cased, trimmed, whitespace-collapsed question text.
pub fn normalize_question(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_lowercases() {
        assert_eq!(normalize_question("  Where IS   my\torder? "), "where is my order?");
    }

    #[test]
    fn preview_falls_back_to_attachment_kind() {
        let msg = NewMessage::text(MessageRole::Customer, "", Utc::now())
            .with_attachment(AttachmentKind::Image, "https://cdn/x.jpg");
        assert_eq!(msg.preview(), "[image]");
    }

    #[test]
    fn learned_data_routes_by_kind() {
        let mut data = LearnedData::default();
        assert!(data.is_empty());
        data.push(LearnedEntry {
            id: "1".into(),
            tenant_id: "t".into(),
            kind: LearnedKind::Script,
            title: "s".into(),
            source_question: "q".into(),
            answer: "a".into(),
            triggers: vec![],
            confidence: 0.9,
            enabled: true,
            hit_count: 0,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        });
        assert_eq!(data.scripts.len(), 1);
        assert!(data.intents.is_empty());
    }
}
