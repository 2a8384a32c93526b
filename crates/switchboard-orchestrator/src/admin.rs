// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin actions. Every action appends an activity entry under the acting
//! admin's username.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use switchboard_core::crm::{CrmProfile, ProfileFields};
use switchboard_core::records::{
    AdminAction, AttachmentKind, Conversation, Correction, LearnedKind, MessageRole, NewActivity,
    NewMessage, ReviewStatus,
};
use switchboard_core::{ControlEvent, OutboundMessage, SwitchboardError};
use tracing::{info, warn};

use crate::Orchestrator;
use crate::tenant::TenantContext;

/// A manual message from an admin. At least one of the fields is set.
#[derive(Debug, Clone, Default)]
pub struct AdminMessage {
    pub text: Option<String>,
    pub media_url: Option<String>,
}

/// An admin's correction of a bot answer.
#[derive(Debug, Clone)]
pub struct CorrectionInput {
    pub user_id: Option<String>,
    pub question: String,
    pub bot_answer: String,
    pub admin_answer: String,
}

impl Orchestrator {
    async fn log(
        &self,
        tenant_id: &str,
        admin: &str,
        action: AdminAction,
        target_user: Option<&str>,
        detail: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        self.store
            .log_activity(
                tenant_id,
                &NewActivity {
                    username: admin.to_string(),
                    action,
                    target_user: target_user.map(str::to_string),
                    detail,
                    created_at: now,
                },
            )
            .await?;
        Ok(())
    }

    /// Sends a manual message and takes the conversation over.
    ///
    /// The message is stored only once the channel accepted it; a failed
    /// send leaves the conversation untouched. Success switches the bot to
    /// manual handling and clears any follow-up flag.
    pub async fn admin_send(
        &self,
        tenant: &TenantContext,
        user_id: &str,
        admin: &str,
        message: AdminMessage,
        now: DateTime<Utc>,
    ) -> Result<i64, SwitchboardError> {
        let tenant_id = tenant.id();
        let text = message.text.filter(|t| !t.trim().is_empty());
        if text.is_none() && message.media_url.is_none() {
            return Err(SwitchboardError::InvalidInput(
                "a manual message needs text or media".to_string(),
            ));
        }
        let conversation = self.store.conversation(tenant_id, user_id).await?;
        let channel = tenant.channel(conversation.source)?;

        let outbound = OutboundMessage {
            recipient_id: user_id.to_string(),
            text: text.clone(),
            media_url: message.media_url.clone(),
            reply_token: None,
        };
        match tokio::time::timeout(self.settings.send_timeout, channel.send(outbound)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(SwitchboardError::Timeout {
                    duration: self.settings.send_timeout,
                });
            }
        }

        let mut stored = NewMessage::text(MessageRole::Admin, text.unwrap_or_default(), now).with_author(admin);
        let action = match message.media_url {
            Some(url) => {
                stored = stored.with_attachment(AttachmentKind::Image, url);
                AdminAction::SendMedia
            }
            None => AdminAction::SendMessage,
        };
        let seq = self.store.add_message(tenant_id, user_id, &stored).await?;
        self.store
            .apply_control(tenant_id, user_id, &ControlEvent::AdminTookOver, now)
            .await?;
        self.store.dismiss_followup(tenant_id, user_id).await?;
        self.log(tenant_id, admin, action, Some(user_id), Some(stored.preview()), now)
            .await?;
        info!(tenant_id, user_id, admin, "admin message delivered");
        Ok(seq)
    }

    pub async fn set_bot(
        &self,
        tenant_id: &str,
        user_id: &str,
        admin: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Conversation, SwitchboardError> {
        let conversation = self
            .store
            .apply_control(tenant_id, user_id, &ControlEvent::SetBotEnabled(enabled), now)
            .await?;
        let detail = if enabled { "enabled" } else { "disabled" };
        self.log(tenant_id, admin, AdminAction::ToggleBot, Some(user_id), Some(detail.to_string()), now)
            .await?;
        Ok(conversation)
    }

    /// Pins, or updates the reason of an existing pin.
    pub async fn pin(
        &self,
        tenant_id: &str,
        user_id: &str,
        admin: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Conversation, SwitchboardError> {
        let conversation = self
            .store
            .apply_control(tenant_id, user_id, &ControlEvent::Pin { reason: reason.to_string() }, now)
            .await?;
        self.log(tenant_id, admin, AdminAction::Pin, Some(user_id), Some(reason.to_string()), now)
            .await?;
        Ok(conversation)
    }

    pub async fn unpin(
        &self,
        tenant_id: &str,
        user_id: &str,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<Conversation, SwitchboardError> {
        let conversation = self
            .store
            .apply_control(tenant_id, user_id, &ControlEvent::Unpin, now)
            .await?;
        self.log(tenant_id, admin, AdminAction::Unpin, Some(user_id), None, now)
            .await?;
        Ok(conversation)
    }

    /// Assigns to `assignee`, or unassigns with `None`.
    pub async fn assign(
        &self,
        tenant_id: &str,
        user_id: &str,
        admin: &str,
        assignee: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Conversation, SwitchboardError> {
        let action = if assignee.is_some() {
            AdminAction::Assign
        } else {
            AdminAction::Unassign
        };
        let detail = assignee.clone();
        let conversation = self
            .store
            .apply_control(tenant_id, user_id, &ControlEvent::Assign(assignee), now)
            .await?;
        self.log(tenant_id, admin, action, Some(user_id), detail, now).await?;
        Ok(conversation)
    }

    pub async fn mark_read(
        &self,
        tenant_id: &str,
        user_id: &str,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        if !self.store.mark_read(tenant_id, user_id).await? {
            return Err(SwitchboardError::NotFound {
                entity: "conversation",
                id: user_id.to_string(),
            });
        }
        self.log(tenant_id, admin, AdminAction::MarkRead, Some(user_id), None, now)
            .await
    }

    /// Deletes the conversation and everything keyed to it.
    pub async fn delete_conversation(
        &self,
        tenant_id: &str,
        user_id: &str,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        if !self.store.delete_conversation(tenant_id, user_id).await? {
            return Err(SwitchboardError::NotFound {
                entity: "conversation",
                id: user_id.to_string(),
            });
        }
        warn!(tenant_id, user_id, admin, "conversation deleted");
        self.log(tenant_id, admin, AdminAction::DeleteConversation, Some(user_id), None, now)
            .await
    }

    /// Stores a correction and hands it to the learning job.
    ///
    /// Analysis runs in the background against the tenant's analysis
    /// provider; without one the correction is kept for later review only.
    pub async fn record_correction(
        &self,
        tenant: &TenantContext,
        admin: &str,
        input: CorrectionInput,
        now: DateTime<Utc>,
    ) -> Result<i64, SwitchboardError> {
        let tenant_id = tenant.id();
        if input.question.trim().is_empty() || input.admin_answer.trim().is_empty() {
            return Err(SwitchboardError::InvalidInput(
                "a correction needs the question and the corrected answer".to_string(),
            ));
        }
        let correction = Correction {
            tenant_id: tenant_id.to_string(),
            user_id: input.user_id,
            admin: admin.to_string(),
            question: input.question,
            bot_answer: input.bot_answer,
            admin_answer: input.admin_answer,
            created_at: now,
        };
        let id = self.learned.record_correction(&correction).await?;
        self.log(
            tenant_id,
            admin,
            AdminAction::RecordCorrection,
            correction.user_id.as_deref(),
            Some(format!("correction #{id}")),
            now,
        )
        .await?;

        match tenant.analysis_provider() {
            Some(provider) => {
                let (analyzer, provider) = (self.analyzer.clone(), Arc::clone(provider));
                self.background.spawn("learning", async move {
                    analyzer
                        .analyze(provider.as_ref(), id, &correction, now)
                        .await
                        .map(|_| ())
                });
            }
            None => warn!(tenant_id, correction_id = id, "no analysis provider, correction not analyzed"),
        }
        Ok(id)
    }

    pub async fn dismiss_followup(
        &self,
        tenant_id: &str,
        user_id: &str,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SwitchboardError> {
        let dismissed = self.store.dismiss_followup(tenant_id, user_id).await?;
        if dismissed {
            self.log(tenant_id, admin, AdminAction::DismissFollowup, Some(user_id), None, now)
                .await?;
        }
        Ok(dismissed)
    }

    /// Manual CRM save; always wins over AI extraction.
    pub async fn save_crm(
        &self,
        tenant_id: &str,
        user_id: &str,
        admin: &str,
        fields: &ProfileFields,
        now: DateTime<Utc>,
    ) -> Result<CrmProfile, SwitchboardError> {
        let profile = self
            .store
            .save_crm_manual(tenant_id, user_id, fields, admin, now)
            .await?;
        self.log(tenant_id, admin, AdminAction::SaveCrm, Some(user_id), None, now)
            .await?;
        Ok(profile)
    }

    /// Tenant-wide bot switch.
    pub async fn set_tenant_bot(
        &self,
        tenant_id: &str,
        admin: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        self.store
            .set_tenant_bot_enabled(tenant_id, enabled, admin, now)
            .await?;
        let detail = if enabled { "enabled" } else { "disabled" };
        info!(tenant_id, admin, enabled, "tenant bot switched");
        self.log(tenant_id, admin, AdminAction::ToggleTenantBot, None, Some(detail.to_string()), now)
            .await
    }

    pub async fn set_learned_enabled(
        &self,
        tenant_id: &str,
        admin: &str,
        kind: LearnedKind,
        id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        if !self.learned.set_enabled(tenant_id, kind, id, enabled).await? {
            return Err(learned_not_found(kind, id));
        }
        let detail = format!("{kind} {id} {}", if enabled { "enabled" } else { "disabled" });
        self.log(tenant_id, admin, AdminAction::ToggleLearned, None, Some(detail), now)
            .await
    }

    pub async fn delete_learned(
        &self,
        tenant_id: &str,
        admin: &str,
        kind: LearnedKind,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        if !self.learned.delete(tenant_id, kind, id).await? {
            return Err(learned_not_found(kind, id));
        }
        self.log(tenant_id, admin, AdminAction::DeleteLearned, None, Some(format!("{kind} {id}")), now)
            .await
    }

    pub async fn review_qa(
        &self,
        tenant_id: &str,
        admin: &str,
        id: i64,
        status: ReviewStatus,
        now: DateTime<Utc>,
    ) -> Result<(), SwitchboardError> {
        if !self.qa.set_review(tenant_id, id, status).await? {
            return Err(SwitchboardError::NotFound {
                entity: "qa entry",
                id: id.to_string(),
            });
        }
        self.log(tenant_id, admin, AdminAction::ReviewQa, None, Some(format!("#{id} {status}")), now)
            .await
    }
}

fn learned_not_found(kind: LearnedKind, id: &str) -> SwitchboardError {
    SwitchboardError::NotFound {
        entity: match kind {
            LearnedKind::Intent => "learned intent",
            LearnedKind::Knowledge => "learned knowledge",
            LearnedKind::Script => "learned script",
        },
        id: id.to_string(),
    }
}
